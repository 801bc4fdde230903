use serde::{Deserialize, Serialize};

/// Object-created notification that starts an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Records in notification order.
    #[serde(rename = "Records", default)]
    pub records: Vec<Record>,
    /// Optional `YYYY-MM-DD` override for the logical date.
    #[serde(rename = "When", default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl TriggerEvent {
    /// Event carrying a single record.
    #[must_use]
    pub fn single(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            records: vec![Record::new(bucket, key)],
            when: None,
        }
    }

    /// Attach a logical date override.
    #[must_use]
    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }
}

/// One object named by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordWire", into = "RecordWire")]
pub struct Record {
    /// Source bucket.
    pub bucket: String,
    /// Source object key.
    pub key: String,
}

impl Record {
    /// Build a record from its bucket and key.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RecordWire {
    s3: S3Wire,
}

#[derive(Serialize, Deserialize)]
struct S3Wire {
    bucket: BucketWire,
    object: ObjectWire,
}

#[derive(Serialize, Deserialize)]
struct BucketWire {
    name: String,
}

#[derive(Serialize, Deserialize)]
struct ObjectWire {
    key: String,
}

impl From<RecordWire> for Record {
    fn from(wire: RecordWire) -> Self {
        Self {
            bucket: wire.s3.bucket.name,
            key: wire.s3.object.key,
        }
    }
}

impl From<Record> for RecordWire {
    fn from(record: Record) -> Self {
        Self {
            s3: S3Wire {
                bucket: BucketWire {
                    name: record.bucket,
                },
                object: ObjectWire { key: record.key },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_event_reads_notification_shape() -> Result<(), serde_json::Error> {
        let raw = r#"{
            "Records": [
                {
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "bucket": { "name": "incoming", "arn": "arn:aws:s3:::incoming" },
                        "object": { "key": "report.csv", "size": 42 }
                    }
                }
            ],
            "When": "2024-03-01"
        }"#;
        let event: TriggerEvent = serde_json::from_str(raw)?;
        assert_eq!(event.records, vec![Record::new("incoming", "report.csv")]);
        assert_eq!(event.when.as_deref(), Some("2024-03-01"));
        Ok(())
    }

    #[test]
    fn missing_records_deserialize_as_empty() -> Result<(), serde_json::Error> {
        let event: TriggerEvent = serde_json::from_str("{}")?;
        assert!(event.records.is_empty());
        assert!(event.when.is_none());

        let rendered = serde_json::to_value(TriggerEvent::single("b", "k.csv"))?;
        assert_eq!(rendered["Records"][0]["s3"]["object"]["key"], "k.csv");
        assert!(rendered.get("When").is_none());
        Ok(())
    }
}
