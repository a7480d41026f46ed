//! PREMIS preservation metadata records and their conversion to and from
//! the XML fragments embedded in `mdWrap/xmlData`.
//!
//! The document core treats embedded metadata as opaque fragments; this
//! module is the one place that interprets them. Each record type keeps the
//! complete fragment it was built or parsed from, so converting back to a
//! fragment loses nothing, and the structured accessors only read the
//! well-known identifier paths.

use crate::constants::PREMIS_NS;
use crate::error::{MetsError, Result};
use crate::xml::{Element, text_element};

fn identifier_element(name: &str, type_tag: &str, value_tag: &str, id: (&str, &str)) -> Element {
    let mut el = Element::in_ns(PREMIS_NS, name);
    el.append(text_element(PREMIS_NS, type_tag, id.0));
    el.append(text_element(PREMIS_NS, value_tag, id.1));
    el
}

fn read_identifier(
    fragment: &Element,
    name: &str,
    type_tag: &str,
    value_tag: &str,
) -> Option<(String, String)> {
    let id = fragment.descendant(PREMIS_NS, name)?;
    let id_type = id.find(PREMIS_NS, type_tag)?.text()?;
    let id_value = id.find(PREMIS_NS, value_tag)?.text()?;
    Some((id_type, id_value))
}

/// A PREMIS `object` record, normally embedded in a techMD.
#[derive(Debug, Clone, PartialEq)]
pub struct PremisObject {
    fragment: Element,
}

impl PremisObject {
    /// Build a minimal object record with one `objectIdentifier`.
    pub fn new(identifier_type: &str, identifier_value: &str) -> Self {
        let mut fragment = Element::in_ns(PREMIS_NS, "object");
        fragment.append(identifier_element(
            "objectIdentifier",
            "objectIdentifierType",
            "objectIdentifierValue",
            (identifier_type, identifier_value),
        ));
        Self { fragment }
    }

    /// Record the `originalName` of the object.
    pub fn with_original_name(mut self, name: &str) -> Self {
        self.fragment.append(text_element(PREMIS_NS, "originalName", name));
        self
    }

    /// Append an arbitrary child (characteristics, relationships, ...)
    /// to the object.
    pub fn with_child(mut self, child: Element) -> Self {
        self.fragment.append(child);
        self
    }

    /// Interpret a fragment as a PREMIS object.
    ///
    /// # Errors
    /// Returns `MalformedRecord` if the root is not a PREMIS `object` or no
    /// complete `objectIdentifier` is present.
    pub fn from_fragment(fragment: &Element) -> Result<Self> {
        if !fragment.is(PREMIS_NS, "object") {
            return Err(MetsError::MalformedRecord(format!(
                "expected a PREMIS object, got {}",
                fragment.name()
            )));
        }
        let record = Self { fragment: fragment.clone() };
        if record.identifier().is_none() {
            return Err(MetsError::MalformedRecord(
                "PREMIS object has no complete objectIdentifier".to_string(),
            ));
        }
        Ok(record)
    }

    /// `(objectIdentifierType, objectIdentifierValue)` of the first
    /// identifier.
    pub fn identifier(&self) -> Option<(String, String)> {
        read_identifier(
            &self.fragment,
            "objectIdentifier",
            "objectIdentifierType",
            "objectIdentifierValue",
        )
    }

    pub fn original_name(&self) -> Option<String> {
        self.fragment.find(PREMIS_NS, "originalName")?.text()
    }

    #[inline]
    pub fn fragment(&self) -> &Element {
        &self.fragment
    }
}

/// A PREMIS `event` record, normally embedded in a digiprovMD.
#[derive(Debug, Clone, PartialEq)]
pub struct PremisEvent {
    fragment: Element,
}

impl PremisEvent {
    /// Build an event record with an identifier, type and date/time.
    pub fn new(
        identifier_type: &str,
        identifier_value: &str,
        event_type: &str,
        date_time: &str,
    ) -> Self {
        let mut fragment = Element::in_ns(PREMIS_NS, "event");
        fragment.append(identifier_element(
            "eventIdentifier",
            "eventIdentifierType",
            "eventIdentifierValue",
            (identifier_type, identifier_value),
        ));
        fragment.append(text_element(PREMIS_NS, "eventType", event_type));
        fragment.append(text_element(PREMIS_NS, "eventDateTime", date_time));
        Self { fragment }
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.fragment.append(text_element(PREMIS_NS, "eventDetail", detail));
        self
    }

    /// Record the event outcome, with an optional detail note.
    pub fn with_outcome(mut self, outcome: &str, detail_note: Option<&str>) -> Self {
        let mut info = Element::in_ns(PREMIS_NS, "eventOutcomeInformation");
        info.append(text_element(PREMIS_NS, "eventOutcome", outcome));
        if let Some(note) = detail_note {
            let mut detail = Element::in_ns(PREMIS_NS, "eventOutcomeDetail");
            detail.append(text_element(PREMIS_NS, "eventOutcomeDetailNote", note));
            info.append(detail);
        }
        self.fragment.append(info);
        self
    }

    /// Link the event to an agent by identifier.
    pub fn with_linking_agent(mut self, identifier_type: &str, identifier_value: &str) -> Self {
        self.fragment.append(identifier_element(
            "linkingAgentIdentifier",
            "linkingAgentIdentifierType",
            "linkingAgentIdentifierValue",
            (identifier_type, identifier_value),
        ));
        self
    }

    /// Interpret a fragment as a PREMIS event.
    ///
    /// # Errors
    /// Returns `MalformedRecord` if the root is not a PREMIS `event` or no
    /// complete `eventIdentifier` is present.
    pub fn from_fragment(fragment: &Element) -> Result<Self> {
        if !fragment.is(PREMIS_NS, "event") {
            return Err(MetsError::MalformedRecord(format!(
                "expected a PREMIS event, got {}",
                fragment.name()
            )));
        }
        let record = Self { fragment: fragment.clone() };
        if record.identifier().is_none() {
            return Err(MetsError::MalformedRecord(
                "PREMIS event has no complete eventIdentifier".to_string(),
            ));
        }
        Ok(record)
    }

    pub fn identifier(&self) -> Option<(String, String)> {
        read_identifier(
            &self.fragment,
            "eventIdentifier",
            "eventIdentifierType",
            "eventIdentifierValue",
        )
    }

    pub fn event_type(&self) -> Option<String> {
        self.fragment.find(PREMIS_NS, "eventType")?.text()
    }

    pub fn date_time(&self) -> Option<String> {
        self.fragment.find(PREMIS_NS, "eventDateTime")?.text()
    }

    pub fn outcome(&self) -> Option<String> {
        self.fragment
            .find(PREMIS_NS, "eventOutcomeInformation")?
            .find(PREMIS_NS, "eventOutcome")?
            .text()
    }

    #[inline]
    pub fn fragment(&self) -> &Element {
        &self.fragment
    }
}

/// A PREMIS `agent` record.
#[derive(Debug, Clone, PartialEq)]
pub struct PremisAgent {
    fragment: Element,
}

impl PremisAgent {
    pub fn new(identifier_type: &str, identifier_value: &str) -> Self {
        let mut fragment = Element::in_ns(PREMIS_NS, "agent");
        fragment.append(identifier_element(
            "agentIdentifier",
            "agentIdentifierType",
            "agentIdentifierValue",
            (identifier_type, identifier_value),
        ));
        Self { fragment }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.fragment.append(text_element(PREMIS_NS, "agentName", name));
        self
    }

    pub fn with_agent_type(mut self, agent_type: &str) -> Self {
        self.fragment.append(text_element(PREMIS_NS, "agentType", agent_type));
        self
    }

    /// Interpret a fragment as a PREMIS agent.
    ///
    /// # Errors
    /// Returns `MalformedRecord` if the root is not a PREMIS `agent` or no
    /// complete `agentIdentifier` is present.
    pub fn from_fragment(fragment: &Element) -> Result<Self> {
        if !fragment.is(PREMIS_NS, "agent") {
            return Err(MetsError::MalformedRecord(format!(
                "expected a PREMIS agent, got {}",
                fragment.name()
            )));
        }
        let record = Self { fragment: fragment.clone() };
        if record.identifier().is_none() {
            return Err(MetsError::MalformedRecord(
                "PREMIS agent has no complete agentIdentifier".to_string(),
            ));
        }
        Ok(record)
    }

    pub fn identifier(&self) -> Option<(String, String)> {
        read_identifier(
            &self.fragment,
            "agentIdentifier",
            "agentIdentifierType",
            "agentIdentifierValue",
        )
    }

    pub fn name(&self) -> Option<String> {
        self.fragment.find(PREMIS_NS, "agentName")?.text()
    }

    #[inline]
    pub fn fragment(&self) -> &Element {
        &self.fragment
    }
}

/// A PREMIS `rights` record, normally embedded in a rightsMD.
#[derive(Debug, Clone, PartialEq)]
pub struct PremisRights {
    fragment: Element,
}

impl PremisRights {
    /// Build a rights record holding one `rightsStatement` with the given
    /// identifier and basis.
    pub fn new(identifier_type: &str, identifier_value: &str, basis: &str) -> Self {
        let mut statement = Element::in_ns(PREMIS_NS, "rightsStatement");
        statement.append(identifier_element(
            "rightsStatementIdentifier",
            "rightsStatementIdentifierType",
            "rightsStatementIdentifierValue",
            (identifier_type, identifier_value),
        ));
        statement.append(text_element(PREMIS_NS, "rightsBasis", basis));
        let mut fragment = Element::in_ns(PREMIS_NS, "rights");
        fragment.append(statement);
        Self { fragment }
    }

    /// Interpret a fragment as a PREMIS rights record. Both a `rights`
    /// root and a bare `rightsStatement` root are accepted.
    ///
    /// # Errors
    /// Returns `MalformedRecord` on any other root element.
    pub fn from_fragment(fragment: &Element) -> Result<Self> {
        if !fragment.is(PREMIS_NS, "rights") && !fragment.is(PREMIS_NS, "rightsStatement") {
            return Err(MetsError::MalformedRecord(format!(
                "expected a PREMIS rights record, got {}",
                fragment.name()
            )));
        }
        Ok(Self { fragment: fragment.clone() })
    }

    /// `(rightsStatementIdentifierType, rightsStatementIdentifierValue)` of
    /// the first statement, when present.
    pub fn identifier(&self) -> Option<(String, String)> {
        read_identifier(
            &self.fragment,
            "rightsStatementIdentifier",
            "rightsStatementIdentifierType",
            "rightsStatementIdentifierValue",
        )
    }

    pub fn basis(&self) -> Option<String> {
        self.fragment.descendant(PREMIS_NS, "rightsBasis")?.text()
    }

    #[inline]
    pub fn fragment(&self) -> &Element {
        &self.fragment
    }
}

/// A classified PREMIS record of any of the four kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum PremisRecord {
    Object(PremisObject),
    Event(PremisEvent),
    Agent(PremisAgent),
    Rights(PremisRights),
}

impl PremisRecord {
    /// Classify a fragment by its root element.
    ///
    /// # Errors
    /// Returns `MalformedRecord` for non-PREMIS fragments, unknown PREMIS
    /// roots, or records missing their mandatory identifier.
    pub fn from_fragment(fragment: &Element) -> Result<Self> {
        if fragment.ns() != Some(PREMIS_NS) {
            return Err(MetsError::MalformedRecord(format!(
                "fragment {} is not in the PREMIS namespace",
                fragment.name()
            )));
        }
        match fragment.name() {
            "object" => Ok(PremisRecord::Object(PremisObject::from_fragment(fragment)?)),
            "event" => Ok(PremisRecord::Event(PremisEvent::from_fragment(fragment)?)),
            "agent" => Ok(PremisRecord::Agent(PremisAgent::from_fragment(fragment)?)),
            "rights" | "rightsStatement" => {
                Ok(PremisRecord::Rights(PremisRights::from_fragment(fragment)?))
            }
            other => Err(MetsError::MalformedRecord(format!(
                "unknown PREMIS record type: {other}"
            ))),
        }
    }

    /// The embeddable XML fragment for this record.
    pub fn to_fragment(&self) -> Element {
        match self {
            PremisRecord::Object(object) => object.fragment().clone(),
            PremisRecord::Event(event) => event.fragment().clone(),
            PremisRecord::Agent(agent) => agent.fragment().clone(),
            PremisRecord::Rights(rights) => rights.fragment().clone(),
        }
    }

    /// The `mdWrap/@MDTYPE` value for this record kind.
    pub fn mdtype(&self) -> &'static str {
        match self {
            PremisRecord::Object(_) => "PREMIS:OBJECT",
            PremisRecord::Event(_) => "PREMIS:EVENT",
            PremisRecord::Agent(_) => "PREMIS:AGENT",
            PremisRecord::Rights(_) => "PREMIS:RIGHTS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_round_trip() {
        let object = PremisObject::new("UUID", "a1b2").with_original_name("cat.png");
        assert_eq!(
            object.identifier(),
            Some(("UUID".to_string(), "a1b2".to_string()))
        );
        assert_eq!(object.original_name().as_deref(), Some("cat.png"));

        let reparsed = PremisObject::from_fragment(object.fragment()).unwrap();
        assert_eq!(reparsed, object);
    }

    #[test]
    fn test_event_fields() {
        let event = PremisEvent::new("UUID", "e1", "ingestion", "2024-05-01T10:00:00")
            .with_detail("program=\"archivematica\"")
            .with_outcome("success", Some("all files transferred"))
            .with_linking_agent("UUID", "agent-1");
        assert_eq!(event.event_type().as_deref(), Some("ingestion"));
        assert_eq!(event.date_time().as_deref(), Some("2024-05-01T10:00:00"));
        assert_eq!(event.outcome().as_deref(), Some("success"));
        assert!(PremisEvent::from_fragment(event.fragment()).is_ok());
    }

    #[test]
    fn test_classification() {
        let record =
            PremisRecord::from_fragment(PremisAgent::new("UUID", "a1").fragment()).unwrap();
        assert!(matches!(record, PremisRecord::Agent(_)));
        assert_eq!(record.mdtype(), "PREMIS:AGENT");

        let record =
            PremisRecord::from_fragment(PremisRights::new("UUID", "r1", "copyright").fragment())
                .unwrap();
        assert_eq!(record.mdtype(), "PREMIS:RIGHTS");
    }

    #[test]
    fn test_malformed_records_rejected() {
        // Wrong namespace
        let err = PremisRecord::from_fragment(&Element::new("object")).unwrap_err();
        assert!(matches!(err, MetsError::MalformedRecord(_)));

        // Unknown root tag
        let err =
            PremisRecord::from_fragment(&Element::in_ns(PREMIS_NS, "premis")).unwrap_err();
        assert!(matches!(err, MetsError::MalformedRecord(_)));

        // Missing identifier
        let err =
            PremisObject::from_fragment(&Element::in_ns(PREMIS_NS, "object")).unwrap_err();
        assert!(matches!(err, MetsError::MalformedRecord(_)));
    }
}
