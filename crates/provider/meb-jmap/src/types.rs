//! JMAP wire types used by the masked email calls.

use meb_core::AliasState;
use serde::de::{self, DeserializeOwned, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// One method call or method response in a batch.
///
/// On the wire this is the positional triple `[name, arguments, callId]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<T> {
    pub name: String,
    pub arguments: T,
    pub call_id: String,
}

impl<T> Invocation<T> {
    pub fn new(name: impl Into<String>, arguments: T, call_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments,
            call_id: call_id.into(),
        }
    }
}

impl Invocation<serde_json::Value> {
    /// Decode the arguments as `T`, leaving name and call id untouched.
    pub fn decode_arguments<T: DeserializeOwned>(self) -> Result<Invocation<T>, serde_json::Error> {
        Ok(Invocation {
            name: self.name,
            arguments: serde_json::from_value(self.arguments)?,
            call_id: self.call_id,
        })
    }
}

impl<T: Serialize> Serialize for Invocation<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut triple = serializer.serialize_tuple(3)?;
        triple.serialize_element(&self.name)?;
        triple.serialize_element(&self.arguments)?;
        triple.serialize_element(&self.call_id)?;
        triple.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Invocation<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InvocationVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for InvocationVisitor<T> {
            type Value = Invocation<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [name, arguments, callId] triple")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let name = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let arguments = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let call_id = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;

                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(4, &self));
                }

                Ok(Invocation {
                    name,
                    arguments,
                    call_id,
                })
            }
        }

        deserializer.deserialize_seq(InvocationVisitor(PhantomData))
    }
}

/// Batch request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub using: Vec<String>,
    pub method_calls: Vec<Invocation<T>>,
}

/// Batch response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    pub method_responses: Vec<Invocation<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
}

/// The parts of the JMAP session resource the client reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResource {
    #[serde(default)]
    pub primary_accounts: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A masked email object, or a patch of one when used in `update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedEmail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AliasState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
}

/// Arguments of `MaskedEmail/set`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedEmailSet {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<HashMap<String, MaskedEmail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<HashMap<String, MaskedEmail>>,
}

/// Result of `MaskedEmail/set`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedEmailSetResponse {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub created: Option<HashMap<String, MaskedEmail>>,
    /// Values are `null` when the server made no changes beyond the patch.
    #[serde(default)]
    pub updated: Option<HashMap<String, Option<MaskedEmail>>>,
    #[serde(default)]
    pub not_created: Option<HashMap<String, SetError>>,
    #[serde(default)]
    pub not_updated: Option<HashMap<String, SetError>>,
}

impl MaskedEmailSetResponse {
    pub fn created(&self, key: &str) -> Option<&MaskedEmail> {
        self.created.as_ref()?.get(key)
    }

    pub fn not_created(&self, key: &str) -> Option<&SetError> {
        self.not_created.as_ref()?.get(key)
    }

    pub fn is_updated(&self, id: &str) -> bool {
        self.updated
            .as_ref()
            .is_some_and(|updated| updated.contains_key(id))
    }

    pub fn not_updated(&self, id: &str) -> Option<&SetError> {
        self.not_updated.as_ref()?.get(id)
    }
}

/// Per-object failure inside a `/set` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl fmt::Display for SetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.error_type, description),
            None => f.write_str(&self.error_type),
        }
    }
}

/// Arguments of an `error` method response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.error_type, description),
            None => f.write_str(&self.error_type),
        }
    }
}
