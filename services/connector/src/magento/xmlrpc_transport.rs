use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Number, Value};
use tokio::sync::OnceCell;

use super::adapter::RpcTransport;
use super::error::RemoteError;

#[derive(Debug, Clone)]
pub struct XmlRpcConfig {
    pub base_url: String,
    pub username: String,
    pub api_key: String,
}

/// XML-RPC transport for `1.7` backends.
///
/// Logs in once per transport and reuses the session for every `call`.
pub struct XmlRpcTransport {
    endpoint: String,
    config: XmlRpcConfig,
    session: OnceCell<String>,
}

impl XmlRpcTransport {
    pub fn new(config: XmlRpcConfig) -> Self {
        let endpoint = format!(
            "{}/index.php/api/xmlrpc",
            config.base_url.trim_end_matches('/')
        );
        Self {
            endpoint,
            config,
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<String, RemoteError> {
        self.session
            .get_or_try_init(|| async {
                let session = invoke(
                    self.endpoint.clone(),
                    "login".to_string(),
                    vec![json!(self.config.username), json!(self.config.api_key)],
                )
                .await?;
                tracing::debug!(endpoint = %self.endpoint, "xml-rpc session opened");
                session
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| RemoteError::Decode(format!("login returned {session}")))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl RpcTransport for XmlRpcTransport {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        let session = self.session().await?;
        invoke(
            self.endpoint.clone(),
            "call".to_string(),
            vec![json!(session), json!(method), Value::Array(args)],
        )
        .await
    }
}

/// The `xmlrpc` client blocks, so each request runs on the blocking pool.
async fn invoke(endpoint: String, method: String, params: Vec<Value>) -> Result<Value, RemoteError> {
    let outcome = tokio::task::spawn_blocking(move || {
        let request = params
            .iter()
            .fold(xmlrpc::Request::new(&method), |request, param| {
                request.arg(to_xmlrpc(param))
            });
        request.call_url(endpoint.as_str())
    })
    .await
    .map_err(|e| RemoteError::Transport(format!("xml-rpc worker failed: {e}")))?;

    outcome.map(|value| from_xmlrpc(&value)).map_err(|err| match err.fault() {
        Some(fault) => RemoteError::Fault {
            code: fault.fault_code,
            message: fault.fault_string.clone(),
        },
        None => RemoteError::Transport(err.to_string()),
    })
}

pub fn to_xmlrpc(value: &Value) -> xmlrpc::Value {
    match value {
        Value::Null => xmlrpc::Value::Nil,
        Value::Bool(b) => xmlrpc::Value::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => match i32::try_from(i) {
                Ok(small) => xmlrpc::Value::Int(small),
                Err(_) => xmlrpc::Value::Int64(i),
            },
            None => xmlrpc::Value::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => xmlrpc::Value::String(s.clone()),
        Value::Array(items) => xmlrpc::Value::Array(items.iter().map(to_xmlrpc).collect()),
        Value::Object(fields) => xmlrpc::Value::Struct(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_xmlrpc(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

pub fn from_xmlrpc(value: &xmlrpc::Value) -> Value {
    match value {
        xmlrpc::Value::Nil => Value::Null,
        xmlrpc::Value::Bool(b) => Value::Bool(*b),
        xmlrpc::Value::Int(i) => json!(i),
        xmlrpc::Value::Int64(i) => json!(i),
        xmlrpc::Value::Double(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
        xmlrpc::Value::String(s) => Value::String(s.clone()),
        xmlrpc::Value::DateTime(dt) => Value::String(format!("{dt:?}")),
        xmlrpc::Value::Base64(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        xmlrpc::Value::Array(items) => Value::Array(items.iter().map(from_xmlrpc).collect()),
        xmlrpc::Value::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), from_xmlrpc(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn string_response(value: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><methodResponse><params><param>\
             <value><string>{value}</string></value>\
             </param></params></methodResponse>"
        )
    }

    fn fault_response(code: i32, message: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
             <member><name>faultCode</name><value><int>{code}</int></value></member>\
             <member><name>faultString</name><value><string>{message}</string></value></member>\
             </struct></value></fault></methodResponse>"
        )
    }

    fn test_config(base_url: &str) -> XmlRpcConfig {
        XmlRpcConfig {
            base_url: base_url.to_string(),
            username: "connector".to_string(),
            api_key: "secret".to_string(),
        }
    }

    #[test]
    fn json_values_map_to_xmlrpc_types() {
        assert_eq!(to_xmlrpc(&json!(5)), xmlrpc::Value::Int(5));
        assert_eq!(
            to_xmlrpc(&json!(5_000_000_000i64)),
            xmlrpc::Value::Int64(5_000_000_000)
        );
        assert_eq!(to_xmlrpc(&Value::Null), xmlrpc::Value::Nil);

        let mut expected = BTreeMap::new();
        expected.insert(
            "from".to_string(),
            xmlrpc::Value::String("2026/02/01 00:00:00".to_string()),
        );
        assert_eq!(
            to_xmlrpc(&json!({ "from": "2026/02/01 00:00:00" })),
            xmlrpc::Value::Struct(expected)
        );
    }

    #[test]
    fn xmlrpc_values_map_back_to_json() {
        let value = xmlrpc::Value::Array(vec![
            xmlrpc::Value::Int(1),
            xmlrpc::Value::String("2".to_string()),
            xmlrpc::Value::Nil,
        ]);
        assert_eq!(from_xmlrpc(&value), json!([1, "2", null]));
    }

    #[tokio::test]
    async fn logs_in_once_and_reuses_session() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/index.php/api/xmlrpc"))
            .and(body_string_contains("<methodName>login</methodName>"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(string_response("session-1"), "text/xml"),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/index.php/api/xmlrpc"))
            .and(body_string_contains("<methodName>call</methodName>"))
            .and(body_string_contains("session-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(string_response("ok"), "text/xml"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let transport = XmlRpcTransport::new(test_config(&server.uri()));
        let first = transport
            .call("catalog_category.info", vec![json!(5)])
            .await
            .unwrap();
        transport
            .call("catalog_category.info", vec![json!(6)])
            .await
            .unwrap();
        assert_eq!(first, json!("ok"));
    }

    #[tokio::test]
    async fn fault_is_reported_with_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("<methodName>login</methodName>"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(string_response("session-1"), "text/xml"),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_string_contains("<methodName>call</methodName>"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(fault_response(102, "Category not exists."), "text/xml"),
            )
            .mount(&server)
            .await;

        let transport = XmlRpcTransport::new(test_config(&server.uri()));
        let err = transport
            .call("catalog_category.info", vec![json!(99)])
            .await
            .unwrap_err();
        match err {
            RemoteError::Fault { code, message } => {
                assert_eq!(code, 102);
                assert_eq!(message, "Category not exists.");
            }
            other => panic!("expected Fault, got: {other:?}"),
        }
    }
}
