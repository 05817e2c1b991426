//! Payload serialization
//!
//! Typed uploads and downloads go through here. Output is always
//! pretty-printed.
//!
//! XML needs a root element. Structs use their type name as the root, as
//! quick-xml does by default. Everything else (scalars, sequences, maps) is
//! wrapped in a `<payload>` envelope with one `<item>` child per value:
//!
//! ```xml
//! <payload>
//!   <item>1</item>
//!   <item>2</item>
//! </payload>
//! ```
//!
//! An empty sequence, alone or as a struct field, writes no elements at all.
//! At the top level that decodes back as empty; a struct field that may be
//! empty needs `#[serde(default)]` to decode.

use quick_xml::DeError;
use quick_xml::events::Event;
use serde::de::DeserializeOwned;
use serde::de::value::SeqDeserializer;
use serde::{Deserialize, Serialize};

use crate::config::SerializationFormat;
use crate::error::Result;

/// Root element of enveloped XML payloads
const ENVELOPE_ROOT: &str = "payload";

#[derive(Serialize)]
#[serde(rename = "payload")]
struct EnvelopeRef<'a, T: ?Sized> {
    item: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    item: T,
}

/// Encode a value as pretty-printed text
pub fn serialize<T: Serialize + ?Sized>(value: &T, format: SerializationFormat) -> Result<String> {
    match format {
        SerializationFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        SerializationFormat::Xml => match write_xml(value) {
            Ok(text) => Ok(text),
            // No root tag of its own; retry inside the envelope.
            Err(DeError::Unsupported(_)) => Ok(write_xml(&EnvelopeRef { item: value })?),
            Err(e) => Err(e.into()),
        },
    }
}

/// Decode text into a value
pub fn deserialize<T: DeserializeOwned>(text: &str, format: SerializationFormat) -> Result<T> {
    match format {
        SerializationFormat::Json => Ok(serde_json::from_str(text)?),
        SerializationFormat::Xml => Ok(read_xml(text)?),
    }
}

fn write_xml<T: Serialize + ?Sized>(value: &T) -> std::result::Result<String, DeError> {
    let mut buffer = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut buffer);
    serializer.indent(' ', 2);
    value.serialize(serializer)?;
    Ok(buffer)
}

fn read_xml<T: DeserializeOwned>(text: &str) -> std::result::Result<T, DeError> {
    match envelope_kind(text)? {
        None => quick_xml::de::from_str(text),
        Some(Contents::Items) => Ok(quick_xml::de::from_str::<Envelope<T>>(text)?.item),
        Some(Contents::Empty) => {
            T::deserialize(SeqDeserializer::<_, DeError>::new(std::iter::empty::<()>()))
        }
    }
}

/// What an enveloped document holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contents {
    Items,
    Empty,
}

/// Inspect the root element; `None` when the document is not enveloped
fn envelope_kind(text: &str) -> std::result::Result<Option<Contents>, DeError> {
    let mut reader = quick_xml::Reader::from_str(text);
    loop {
        match reader.read_event()? {
            Event::Empty(root) => {
                return Ok((root.name().as_ref() == ENVELOPE_ROOT.as_bytes()).then_some(Contents::Empty));
            }
            Event::Start(root) => {
                if root.name().as_ref() != ENVELOPE_ROOT.as_bytes() {
                    return Ok(None);
                }
                loop {
                    match reader.read_event()? {
                        Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => {}
                        Event::Comment(_) => {}
                        Event::End(_) => return Ok(Some(Contents::Empty)),
                        _ => return Ok(Some(Contents::Items)),
                    }
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        name: String,
        count: u32,
        active: bool,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tagged {
        #[serde(default)]
        tags: Vec<String>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct StrictTagged {
        tags: Vec<String>,
    }

    fn sample() -> Report {
        Report {
            name: "nightly".into(),
            count: 42,
            active: true,
        }
    }

    fn xml_round_trip<T>(value: &T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let text = serialize(value, SerializationFormat::Xml).unwrap();
        deserialize(&text, SerializationFormat::Xml).unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let text = serialize(&sample(), SerializationFormat::Json).unwrap();
        assert!(text.contains('\n'));
        let back: Report = deserialize(&text, SerializationFormat::Json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_xml_round_trip() {
        let text = serialize(&sample(), SerializationFormat::Xml).unwrap();
        assert!(text.starts_with("<Report>"));
        assert!(text.contains("<count>42</count>"));
        let back: Report = deserialize(&text, SerializationFormat::Xml).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_xml_scalar_uses_envelope() {
        let text = serialize(&42u32, SerializationFormat::Xml).unwrap();
        assert!(text.starts_with("<payload>"));
        assert!(text.contains("<item>42</item>"));
        assert_eq!(xml_round_trip(&42u32), 42);
        assert_eq!(xml_round_trip(&"hello".to_string()), "hello");
    }

    #[test]
    fn test_xml_sequence_of_structs() {
        let items = vec![Item { id: 1 }, Item { id: 2 }];
        let text = serialize(&items, SerializationFormat::Xml).unwrap();
        assert!(text.starts_with("<payload>"));
        assert_eq!(xml_round_trip(&items), items);
    }

    #[test]
    fn test_xml_empty_sequence() {
        let text = serialize(&Vec::<Item>::new(), SerializationFormat::Xml).unwrap();
        assert_eq!(text.trim(), "<payload/>");
        assert_eq!(xml_round_trip(&Vec::<Item>::new()), Vec::<Item>::new());
    }

    #[test]
    fn test_xml_map() {
        let map: BTreeMap<String, u32> = [("a".to_string(), 1), ("b".to_string(), 2)]
            .into_iter()
            .collect();
        assert_eq!(xml_round_trip(&map), map);
    }

    #[test]
    fn test_xml_empty_vec_field_needs_serde_default() {
        let tagged = Tagged { tags: vec![] };
        assert_eq!(xml_round_trip(&tagged), tagged);

        let full = Tagged {
            tags: vec!["a".into(), "b".into()],
        };
        assert_eq!(xml_round_trip(&full), full);

        let text = serialize(&StrictTagged { tags: vec![] }, SerializationFormat::Xml).unwrap();
        let strict: Result<StrictTagged> = deserialize(&text, SerializationFormat::Xml);
        assert!(matches!(strict, Err(crate::Error::Xml(_))));
    }

    #[test]
    fn test_deserialize_errors_propagate() {
        let json: Result<Report> = deserialize("{not json", SerializationFormat::Json);
        assert!(matches!(json, Err(crate::Error::Json(_))));

        let xml: Result<Report> = deserialize("<Report><count>x</count>", SerializationFormat::Xml);
        assert!(matches!(xml, Err(crate::Error::Xml(_))));
    }
}
