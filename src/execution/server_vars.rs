use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// CGI/1.1 meta-variables handed to a script.
///
/// Setting a key twice keeps the later value. Names follow
/// [RFC 3875 §4.1](https://datatracker.ietf.org/doc/html/rfc3875#section-4.1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVars {
    vars: BTreeMap<String, String>,
}

impl ServerVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway, software and request-time variables every request carries.
    pub fn web_defaults() -> Self {
        let mut vars = Self::new();

        vars.set("GATEWAY_INTERFACE", "CGI/1.1")
            .set("SERVER_SOFTWARE", crate::SERVER_SOFTWARE)
            .request_time();

        vars
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.vars
            .insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    pub fn request_method(&mut self, method: &str) -> &mut Self {
        self.set("REQUEST_METHOD", method)
    }

    pub fn request_uri(&mut self, uri: &str) -> &mut Self {
        self.set("REQUEST_URI", uri)
    }

    pub fn query_string(&mut self, qs: &str) -> &mut Self {
        self.set("QUERY_STRING", qs)
    }

    fn request_time(&mut self) -> &mut Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        self.set("REQUEST_TIME", now.as_secs().to_string())
            .set("REQUEST_TIME_FLOAT", format!("{:.6}", now.as_secs_f64()))
    }

    pub fn script_filename(&mut self, path: &Path) -> &mut Self {
        self.set("SCRIPT_FILENAME", path.to_string_lossy())
    }

    /// `SCRIPT_NAME` and its PHP alias `PHP_SELF`.
    pub fn script_name(&mut self, name: &str) -> &mut Self {
        self.set("SCRIPT_NAME", name)
            .set("PHP_SELF", name)
    }

    pub fn document_root(&mut self, path: &Path) -> &mut Self {
        self.set("DOCUMENT_ROOT", path.to_string_lossy())
    }

    /// `PATH_INFO` plus `PATH_TRANSLATED` under the document root.
    pub fn path_info(
        &mut self,
        path_info: &str,
        document_root: &Path,
    ) -> &mut Self {
        let translated = document_root.join(path_info.trim_start_matches('/'));

        self.set("PATH_INFO", path_info)
            .set("PATH_TRANSLATED", translated.to_string_lossy())
    }

    pub fn server_name(&mut self, name: &str) -> &mut Self {
        self.set("SERVER_NAME", name)
    }

    pub fn server_port(&mut self, port: u16) -> &mut Self {
        self.set("SERVER_PORT", port.to_string())
    }

    pub fn server_protocol(&mut self, proto: &str) -> &mut Self {
        self.set("SERVER_PROTOCOL", proto)
    }

    pub fn https(&mut self, enabled: bool) -> &mut Self {
        if enabled {
            self.set("HTTPS", "on")
                .set("REQUEST_SCHEME", "https")
        } else {
            self.vars.remove("HTTPS");
            self.set("REQUEST_SCHEME", "http")
        }
    }

    /// Request header as `HTTP_*`, except the two CGI reserves for the body.
    pub fn http_header(&mut self, name: &str, value: &str) -> &mut Self {
        let key = cgi_name(name);

        match key.as_str() {
            "CONTENT_TYPE" | "CONTENT_LENGTH" => self.set(key, value),
            _ => self.set(format!("HTTP_{}", key), value),
        }
    }

    pub fn content_length(&mut self, len: usize) -> &mut Self {
        self.set("CONTENT_LENGTH", len.to_string())
    }
}

fn cgi_name(header: &str) -> String {
    header
        .chars()
        .map(|c| match c {
            '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_later_value_wins() {
        let mut vars = ServerVars::new();
        vars.request_uri("/a").request_uri("/b");

        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("REQUEST_URI"), Some("/b"));
        assert_eq!(vars.get("QUERY_STRING"), None);
    }

    #[test]
    fn test_headers_become_cgi_names() {
        let mut vars = ServerVars::new();
        vars.http_header("Content-Type", "text/html")
            .http_header("content-length", "100")
            .http_header("X-Forwarded-For", "10.0.0.1");

        assert_eq!(vars.get("CONTENT_TYPE"), Some("text/html"));
        assert_eq!(vars.get("CONTENT_LENGTH"), Some("100"));
        assert_eq!(vars.get("HTTP_X_FORWARDED_FOR"), Some("10.0.0.1"));
        assert!(vars.get("HTTP_CONTENT_TYPE").is_none());
    }

    #[test]
    fn test_web_defaults() {
        let vars = ServerVars::web_defaults();

        assert_eq!(vars.get("GATEWAY_INTERFACE"), Some("CGI/1.1"));
        assert_eq!(vars.get("SERVER_SOFTWARE"), Some(crate::SERVER_SOFTWARE));
        assert!(vars
            .get("REQUEST_TIME")
            .is_some_and(|t| t.parse::<u64>().is_ok()));
        assert!(vars.get("REQUEST_TIME_FLOAT").is_some());
    }

    #[test]
    fn test_https_toggle() {
        let mut vars = ServerVars::new();

        vars.https(true);
        assert_eq!(vars.get("HTTPS"), Some("on"));
        assert_eq!(vars.get("REQUEST_SCHEME"), Some("https"));

        vars.https(false);
        assert!(vars.get("HTTPS").is_none());
        assert_eq!(vars.get("REQUEST_SCHEME"), Some("http"));
    }

    #[test]
    fn test_path_info_is_translated_under_root() {
        let mut vars = ServerVars::new();
        vars.path_info("/extra/path", &PathBuf::from("/var/www"))
            .script_name("/index.php");

        assert_eq!(vars.get("PATH_INFO"), Some("/extra/path"));
        assert_eq!(vars.get("PATH_TRANSLATED"), Some("/var/www/extra/path"));
        assert_eq!(vars.get("PHP_SELF"), Some("/index.php"));
    }
}
