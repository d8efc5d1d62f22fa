//! Stub records: recorded or hand-written interactions a stub server
//! replays, in their JSON encoding.
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::error::{ContractError, ContractResult};
use crate::feature::{Feature, Scenario};
use crate::http::{HttpRequest, HttpResponse};
use crate::result::MatchResult;
use crate::value::Value;

pub const HTTP_REQUEST: &str = "http-request";
pub const HTTP_RESPONSE: &str = "http-response";
pub const DELAY_IN_SECONDS: &str = "delay-in-seconds";
pub const KAFKA_MESSAGE: &str = "kafka-message";

const HTTP_REQUEST_KEYS: [&str; 2] = ["mock-http-request", HTTP_REQUEST];
const HTTP_RESPONSE_KEYS: [&str; 2] = ["mock-http-response", HTTP_RESPONSE];

#[derive(Debug, Clone, PartialEq)]
pub enum StubRecord {
    Http {
        request: HttpRequest,
        response: HttpResponse,
        delay_in_seconds: Option<u64>,
    },
    Kafka(KafkaMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaMessage {
    pub topic: String,
    pub key: Option<String>,
    pub value: Value,
}

impl StubRecord {
    pub fn from_json(json: &serde_json::Value) -> ContractResult<Self> {
        let serde_json::Value::Object(record) = json else {
            return Err(ContractError::InvalidStub("a stub record must be a json object".into()));
        };

        if let Some(message) = record.get(KAFKA_MESSAGE) {
            return KafkaMessage::from_json(message).map(StubRecord::Kafka);
        }

        let Some(request) = first_present(record, &HTTP_REQUEST_KEYS) else {
            return Err(ContractError::InvalidStub(
                "this record describes neither a kafka message nor a request to be mocked".into(),
            ));
        };
        let Some(response) = first_present(record, &HTTP_RESPONSE_KEYS) else {
            return Err(ContractError::InvalidStub("this record does not describe the response to be mocked".into()));
        };
        let delay_in_seconds = match record.get(DELAY_IN_SECONDS) {
            None | Some(serde_json::Value::Null) => None,
            Some(delay) => Some(
                delay
                    .as_u64()
                    .ok_or_else(|| ContractError::InvalidStub(format!("{DELAY_IN_SECONDS} should be a number")))?,
            ),
        };

        Ok(StubRecord::Http {
            request: decode(request).map_err(|e| e.at(HTTP_REQUEST))?,
            response: decode(response).map_err(|e| e.at(HTTP_RESPONSE))?,
            delay_in_seconds,
        })
    }

    pub fn to_json(&self) -> ContractResult<serde_json::Value> {
        let mut record = serde_json::Map::new();
        match self {
            StubRecord::Http { request, response, delay_in_seconds } => {
                record.insert(HTTP_REQUEST.into(), encode(request).map_err(|e| e.at(HTTP_REQUEST))?);
                record.insert(HTTP_RESPONSE.into(), encode(response).map_err(|e| e.at(HTTP_RESPONSE))?);
                if let Some(delay) = delay_in_seconds {
                    record.insert(DELAY_IN_SECONDS.into(), (*delay).into());
                }
            }
            StubRecord::Kafka(message) => {
                record.insert(KAFKA_MESSAGE.into(), message.to_json());
            }
        }
        Ok(serde_json::Value::Object(record))
    }
}

impl KafkaMessage {
    fn from_json(json: &serde_json::Value) -> ContractResult<Self> {
        let serde_json::Value::Object(message) = json else {
            return Err(ContractError::InvalidStub(format!("{KAFKA_MESSAGE} should be a json object")));
        };
        let topic = message
            .get("topic")
            .ok_or_else(|| ContractError::InvalidStub("kafka message stub info must contain a topic name".into()))?;
        let value = message
            .get("value")
            .ok_or_else(|| ContractError::InvalidStub("kafka message stub info must contain a payload".into()))?;
        Ok(Self {
            topic: Value::from_json(topic).to_text(),
            key: message.get("key").map(|key| Value::from_json(key).to_text()),
            value: Value::from_json(value),
        })
    }

    fn to_json(&self) -> serde_json::Value {
        let mut message = serde_json::Map::new();
        message.insert("topic".into(), self.topic.clone().into());
        if let Some(key) = &self.key {
            message.insert("key".into(), key.clone().into());
        }
        message.insert("value".into(), self.value.to_json());
        serde_json::Value::Object(message)
    }
}

fn first_present<'a>(
    record: &'a serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Option<&'a serde_json::Value> {
    keys.iter().find_map(|key| record.get(*key))
}

fn decode<T: DeserializeOwned>(json: &serde_json::Value) -> ContractResult<T> {
    if !json.is_object() {
        return Err(ContractError::InvalidStub("should be a json object".into()));
    }
    serde_json::from_value(json.clone()).map_err(|error| ContractError::InvalidStub(error.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> ContractResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|error| ContractError::InvalidStub(error.to_string()))
}

// ————————————————————————————————————————————————————————————————————————————
// STUB VALIDATION
// ————————————————————————————————————————————————————————————————————————————

impl Feature {
    /// The first active scenario that accepts the recorded interaction; when
    /// none does, the failure reported by each active scenario.
    pub fn match_stub(&self, request: &HttpRequest, response: &HttpResponse) -> Result<&Scenario, Vec<MatchResult>> {
        let mut failures = Vec::new();
        for scenario in self.active_scenarios() {
            let result = scenario
                .matches_request(request)
                .and_then(|| scenario.matches_response(response))
                .with_scenario(scenario.name.clone());
            match result {
                MatchResult::Success => return Ok(scenario),
                failure => failures.push(failure),
            }
        }
        Err(failures)
    }

    /// Generated stub records, one per active scenario.
    pub fn generate_stubs(&self) -> ContractResult<IndexMap<String, StubRecord>> {
        self.active_scenarios()
            .map(|scenario| -> ContractResult<(String, StubRecord)> {
                let record = StubRecord::Http {
                    request: scenario.generate_request().map_err(|e| e.at(scenario.name.clone()))?,
                    response: scenario.generate_response().map_err(|e| e.at(scenario.name.clone()))?,
                    delay_in_seconds: None,
                };
                Ok((scenario.name.clone(), record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_feature;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn http_records_accept_both_key_spellings() {
        let record = StubRecord::from_json(&json!({
            "mock-http-request": {"method": "GET", "path": "/customers/10"},
            "mock-http-response": {"status": 200, "body": {"name": "Jane"}},
            "delay-in-seconds": 2
        }))
        .unwrap();
        let StubRecord::Http { request, response, delay_in_seconds } = &record else { panic!("expected http record") };
        assert_eq!(request.path, "/customers/10");
        assert_eq!(response.status, 200);
        assert_eq!(*delay_in_seconds, Some(2));

        let canonical = record.to_json().unwrap();
        assert!(canonical.get(HTTP_REQUEST).is_some());
        assert_eq!(StubRecord::from_json(&canonical).unwrap(), record);
    }

    #[test]
    fn unencodable_parts_are_errors() {
        let keyed_by_lists = std::collections::BTreeMap::from([(vec![1u8], 1)]);
        let err = encode(&keyed_by_lists).unwrap_err();
        assert!(matches!(err, ContractError::InvalidStub(_)), "{err}");
    }

    #[test]
    fn incomplete_records_are_rejected() {
        let err = StubRecord::from_json(&json!({"delay-in-seconds": 1})).unwrap_err();
        assert!(err.to_string().contains("neither a kafka message nor a request"));
        let err = StubRecord::from_json(&json!({"http-request": {"method": "GET", "path": "/"}})).unwrap_err();
        assert!(err.to_string().contains("response"));
        let err = StubRecord::from_json(&json!({
            "http-request": {"method": "GET", "path": "/"},
            "http-response": {"status": "ok"}
        }))
        .unwrap_err();
        assert_eq!(err.path(), HTTP_RESPONSE);
    }

    #[test]
    fn kafka_messages_need_topic_and_value() {
        let record = StubRecord::from_json(&json!({"kafka-message": {"topic": "orders", "key": 1, "value": {"id": 1}}})).unwrap();
        assert_eq!(
            record,
            StubRecord::Kafka(KafkaMessage {
                topic: "orders".into(),
                key: Some("1".into()),
                value: Value::from_json(&json!({"id": 1})),
            })
        );
        assert!(StubRecord::from_json(&json!({"kafka-message": {"value": 1}})).is_err());
        assert!(StubRecord::from_json(&json!({"kafka-message": {"topic": "orders"}})).is_err());
    }

    #[test]
    fn stubs_are_matched_to_scenarios() {
        let feature = parse_feature(
            &json!({
                "types": {"Customer": {"name": "(string)"}},
                "scenarios": [
                    {"name": "get", "request": {"method": "GET", "path": "/customers/(id:number)"}, "response": {"status": 200, "body": "(Customer)"}},
                    {"name": "delete", "request": {"method": "DELETE", "path": "/customers/(id:number)"}, "response": {"status": 204}}
                ]
            })
            .to_string(),
        )
        .unwrap();

        let request = HttpRequest::new("GET", "/customers/10");
        let ok = HttpResponse::new(200).with_body(Value::from_json(&json!({"name": "Jane"})));
        assert_eq!(feature.match_stub(&request, &ok).unwrap().name, "get");

        let bad = HttpResponse::new(200).with_body(Value::from_json(&json!({"name": 1})));
        let failures = feature.match_stub(&request, &bad).unwrap_err();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].as_failure().unwrap().path(), "RESPONSE.BODY.name");

        let stubs = feature.generate_stubs().unwrap();
        assert_eq!(stubs.len(), 2);
        for (name, stub) in &stubs {
            let StubRecord::Http { request, response, .. } = stub else { panic!("expected http record") };
            assert_eq!(&feature.match_stub(request, response).unwrap().name, name);
        }
    }
}
