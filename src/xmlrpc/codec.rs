//! Encoding of `methodCall` documents and decoding of `methodResponse`
//! documents.
//!
//! Both directions go through serde types mirroring the XML-RPC element
//! structure; `quick-xml` maps elements onto them. A `<value>` holds either
//! one typed child element or bare text, which XML-RPC defines as a string.

use std::collections::BTreeMap;

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};

use super::{Value, XmlRpcError};

// MethodCall is the root of a request document.
#[derive(Debug, Serialize)]
#[serde(rename = "methodCall")]
struct MethodCall<'a> {
    #[serde(rename = "methodName")]
    method_name: &'a str,
    params: ParamList,
}

// ParamList is the `<params>` element shared by requests and responses.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ParamList {
    #[serde(rename = "param", default)]
    params: Vec<Param>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Param {
    value: ValueXml,
}

// MethodResponse is the root of a reply: either params or a fault.
#[derive(Debug, Deserialize)]
struct MethodResponse {
    #[serde(rename = "$value")]
    body: ResponseBody,
}

#[derive(Debug, Deserialize)]
enum ResponseBody {
    #[serde(rename = "params")]
    Params(ParamList),
    #[serde(rename = "fault")]
    Fault(FaultXml),
}

#[derive(Debug, Deserialize)]
struct FaultXml {
    value: ValueXml,
}

// ValueXml is a `<value>` element; empty content is an empty string.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ValueXml {
    #[serde(rename = "$value", default)]
    content: Vec<Content>,
}

#[derive(Debug, Deserialize, Serialize)]
enum Content {
    #[serde(rename = "int", alias = "i4")]
    Int(i64),
    #[serde(rename = "i8")]
    I8(i64),
    #[serde(rename = "boolean")]
    Boolean(String),
    #[serde(rename = "double")]
    Double(f64),
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "dateTime.iso8601")]
    DateTime(String),
    #[serde(rename = "base64")]
    Base64(String),
    #[serde(rename = "array")]
    Array(ArrayXml),
    #[serde(rename = "struct")]
    Struct(StructXml),
    #[serde(rename = "nil")]
    Nil,
    #[serde(rename = "$text")]
    Text(String),
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ArrayXml {
    #[serde(default)]
    data: DataXml,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct DataXml {
    #[serde(rename = "value", default)]
    values: Vec<ValueXml>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct StructXml {
    #[serde(rename = "member", default)]
    members: Vec<Member>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Member {
    name: String,
    value: ValueXml,
}

impl ValueXml {
    fn from_value(value: &Value) -> Self {
        Self {
            content: vec![Content::from_value(value)],
        }
    }

    fn into_value(self) -> Result<Value, XmlRpcError> {
        let mut content = self.content.into_iter();
        match (content.next(), content.next()) {
            (None, _) => Ok(Value::String(String::new())),
            (Some(only), None) => only.into_value(),
            (Some(_), Some(_)) => Err(XmlRpcError::Parse(String::from(
                "<value> holds more than one item",
            ))),
        }
    }
}

impl Content {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(number) if i32::try_from(*number).is_ok() => Self::Int(*number),
            Value::Int(number) => Self::I8(*number),
            Value::Bool(flag) => Self::Boolean(String::from(if *flag { "1" } else { "0" })),
            Value::Double(number) => Self::Double(*number),
            Value::String(text) => Self::String(text.clone()),
            Value::DateTime(text) => Self::DateTime(text.clone()),
            Value::Base64(text) => Self::Base64(text.clone()),
            Value::Array(items) => Self::Array(ArrayXml {
                data: DataXml {
                    values: items.iter().map(ValueXml::from_value).collect(),
                },
            }),
            Value::Struct(members) => Self::Struct(StructXml {
                members: members
                    .iter()
                    .map(|(name, member)| Member {
                        name: name.clone(),
                        value: ValueXml::from_value(member),
                    })
                    .collect(),
            }),
            Value::Nil => Self::Nil,
        }
    }

    fn into_value(self) -> Result<Value, XmlRpcError> {
        match self {
            Self::Int(number) | Self::I8(number) => Ok(Value::Int(number)),
            Self::Boolean(text) => match text.trim() {
                "1" => Ok(Value::Bool(true)),
                "0" => Ok(Value::Bool(false)),
                other => Err(XmlRpcError::Parse(format!("invalid boolean '{other}'"))),
            },
            Self::Double(number) => Ok(Value::Double(number)),
            Self::String(text) | Self::Text(text) => Ok(Value::String(text)),
            Self::DateTime(text) => Ok(Value::DateTime(text.trim().to_owned())),
            Self::Base64(text) => Ok(Value::Base64(text.trim().to_owned())),
            Self::Array(array) => array
                .data
                .values
                .into_iter()
                .map(ValueXml::into_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Self::Struct(record) => record
                .members
                .into_iter()
                .map(|member| Ok((member.name, member.value.into_value()?)))
                .collect::<Result<BTreeMap<_, _>, XmlRpcError>>()
                .map(Value::Struct),
            Self::Nil => Ok(Value::Nil),
        }
    }
}

/// Renders a `methodCall` document for `method` with positional `params`.
///
/// # Errors
///
/// Returns [`XmlRpcError::Encode`] when the document cannot be written.
pub fn encode_call(method: &str, params: &[Value]) -> Result<String, XmlRpcError> {
    let call = MethodCall {
        method_name: method,
        params: ParamList {
            params: params
                .iter()
                .map(|value| Param {
                    value: ValueXml::from_value(value),
                })
                .collect(),
        },
    };
    let document = to_string(&call).map_err(|err| XmlRpcError::Encode(err.to_string()))?;
    Ok(format!("<?xml version=\"1.0\"?>\n{document}\n"))
}

/// Parses a `methodResponse` document and returns its single result value.
///
/// # Errors
///
/// Returns [`XmlRpcError::Fault`] when the server answered with a fault and
/// [`XmlRpcError::Parse`] when the document is not a well-formed response.
pub fn decode_response(body: &str) -> Result<Value, XmlRpcError> {
    let response: MethodResponse =
        from_str(body).map_err(|err| XmlRpcError::Parse(err.to_string()))?;
    match response.body {
        ResponseBody::Params(list) => list
            .params
            .into_iter()
            .next()
            .ok_or_else(|| XmlRpcError::Parse(String::from("response carries no value")))?
            .value
            .into_value(),
        ResponseBody::Fault(fault) => Err(fault_from(&fault.value.into_value()?)),
    }
}

fn fault_from(detail: &Value) -> XmlRpcError {
    let members = detail.as_struct();
    let code = members
        .and_then(|fields| fields.get("faultCode"))
        .and_then(|code| match code {
            Value::Int(number) => Some(*number),
            _ => None,
        })
        .unwrap_or_default();
    let message = members
        .and_then(|fields| fields.get("faultString"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    XmlRpcError::Fault { code, message }
}
