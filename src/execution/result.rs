/// Response produced by the engine for one request.
#[must_use]
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl ExecutionResult {
    pub fn new(status: u16, body: Vec<u8>, headers: Vec<(String, String)>) -> Self {
        Self {
            status,
            body,
            headers,
        }
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn into_http_response(self) -> http::Response<Vec<u8>> {
        let mut builder = http::Response::builder().status(self.status);

        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(self.body)
            .unwrap_or_else(|_| http::Response::new(Vec::new()))
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            status: 200,
            body: Vec::new(),
            headers: Vec::new(),
        }
    }
}

impl From<ExecutionResult> for http::Response<Vec<u8>> {
    fn from(res: ExecutionResult) -> Self {
        res.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let result = ExecutionResult::new(
            201,
            b"ok".to_vec(),
            vec![("Content-Type".to_string(), "text/plain".to_string())],
        );

        assert_eq!(result.header("content-type"), Some("text/plain"));
        assert_eq!(result.header("X-Missing"), None);
        assert!(result.is_success());
        assert!(!result.is_redirect());
    }

    #[test]
    fn test_into_http_response() {
        let result = ExecutionResult::new(
            404,
            b"missing".to_vec(),
            vec![("X-Powered-By".to_string(), "PHP".to_string())],
        );

        let response: http::Response<Vec<u8>> = result.into();

        assert_eq!(response.status(), 404);
        assert_eq!(response.headers()["x-powered-by"], "PHP");
        assert_eq!(response.body(), b"missing");
    }
}
