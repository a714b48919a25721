use log::{debug, info, warn};

use crate::{
    config::{ENCODE_CAPACITY, PATH_PREFIX, SERVER_HOST},
    encoding::encode_with_capacity,
    ports::{MessageSender, SendError, Transport},
};

/// Path and query for one message. The second value is set when the encoded
/// message did not fit and only a prefix is carried.
pub fn request_target(message: &str, capacity: usize) -> (String, bool) {
    let encoded = encode_with_capacity(message.as_bytes(), capacity);
    if encoded.truncated {
        warn!(
            "message truncated to {}/{} bytes to fit the query buffer",
            encoded.consumed,
            message.len()
        );
    }

    let mut target = String::with_capacity(PATH_PREFIX.len() + encoded.text.len());
    target.push_str(PATH_PREFIX);
    target.push_str(&encoded.text);
    (target, encoded.truncated)
}

/// Sends each message as the `msg` query value of a GET to the report
/// server, one request per message and no retries.
pub struct HttpReporter<T> {
    transport: T,
    host: String,
    capacity: usize,
}

impl<T: Transport> HttpReporter<T> {
    pub fn new(transport: T) -> Self {
        Self::with_host(transport, SERVER_HOST)
    }

    pub fn with_host(transport: T, host: impl Into<String>) -> Self {
        Self {
            transport,
            host: host.into(),
            capacity: ENCODE_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> MessageSender for HttpReporter<T> {
    fn send(&mut self, message: &str) -> Result<(), SendError> {
        info!("sending: {message}");

        let (target, _truncated) = request_target(message, self.capacity);
        let response = self.transport.get(&self.host, &target)?;

        match response.content_length {
            Some(length) => info!(
                "{} answered HTTP {} (content-length {length}, {} body bytes kept)",
                self.host,
                response.status,
                response.body.len()
            ),
            None => info!(
                "{} answered HTTP {} ({} body bytes)",
                self.host,
                response.status,
                response.body.len()
            ),
        }
        if response.body_truncated() {
            debug!("response body cut to {} bytes", response.body.len());
        }
        if !response.body.is_empty() {
            debug!("response body: {}", response.body);
        }

        if !response.is_success() {
            return Err(SendError::Rejected {
                status: response.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        encoding::decode,
        ports::{Response, TransportError},
    };

    #[derive(Default)]
    struct ScriptedTransport {
        requests: Vec<(String, String)>,
        outcomes: VecDeque<Result<Response, TransportError>>,
    }

    impl ScriptedTransport {
        fn answering(outcomes: Vec<Result<Response, TransportError>>) -> Self {
            Self {
                requests: Vec::new(),
                outcomes: outcomes.into(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&mut self, host: &str, target: &str) -> Result<Response, TransportError> {
            self.requests.push((host.to_string(), target.to_string()));
            self.outcomes.pop_front().unwrap_or_else(|| Ok(ok_response()))
        }
    }

    fn ok_response() -> Response {
        Response {
            status: 200,
            content_length: Some(2),
            body: "ok".to_string(),
        }
    }

    #[test]
    fn target_is_prefix_plus_encoded_message() {
        let (target, truncated) = request_target("Temperature: 25.00 °C", 512);

        assert_eq!(target, "/mensagem?msg=Temperature%3A%2025.00%20%C2%B0C");
        assert!(!truncated);
    }

    #[test]
    fn long_message_is_truncated_but_still_sent() {
        let message = "x".repeat(600);
        let mut reporter = HttpReporter::new(ScriptedTransport::default());

        reporter.send(&message).unwrap();

        let (_, target) = &reporter.transport().requests[0];
        let query = target.strip_prefix(PATH_PREFIX).unwrap();
        assert_eq!(query.len(), ENCODE_CAPACITY - 3);
        assert!(message.starts_with(query));
    }

    #[test]
    fn sends_one_request_to_the_report_host() {
        let mut reporter = HttpReporter::new(ScriptedTransport::default());

        reporter.send("Button pressed | Mode: Fahrenheit").unwrap();

        let requests = &reporter.transport().requests;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "serverpico.onrender.com");
        let query = requests[0].1.strip_prefix(PATH_PREFIX).unwrap();
        assert_eq!(
            decode(query).unwrap(),
            b"Button pressed | Mode: Fahrenheit".to_vec()
        );
    }

    #[test]
    fn transport_failure_is_reported_without_retry() {
        let transport = ScriptedTransport::answering(vec![Err(TransportError::Timeout {
            host: "serverpico.onrender.com".to_string(),
        })]);
        let mut reporter = HttpReporter::new(transport);

        let err = reporter.send("hello").unwrap_err();

        assert!(matches!(
            err,
            SendError::Transport(TransportError::Timeout { .. })
        ));
        assert_eq!(reporter.transport().requests.len(), 1);
    }

    #[test]
    fn non_success_status_is_rejected() {
        let transport = ScriptedTransport::answering(vec![Ok(Response {
            status: 503,
            content_length: None,
            body: String::new(),
        })]);
        let mut reporter = HttpReporter::with_host(transport, "localhost");

        let err = reporter.send("hello").unwrap_err();

        assert!(matches!(err, SendError::Rejected { status: 503 }));
        assert_eq!(reporter.transport().requests[0].0, "localhost");
    }

    #[test]
    fn smaller_capacity_shortens_the_query() {
        let mut reporter =
            HttpReporter::new(ScriptedTransport::default()).with_capacity(8);

        reporter.send("hello world").unwrap();

        assert_eq!(reporter.transport().requests[0].1, "/mensagem?msg=hello");
    }
}
