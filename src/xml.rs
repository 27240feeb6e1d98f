// Minimal element tree over quick-xml, shared by the XML readers and writers

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{AttackGraphError, Result};

/// An XML element with its attributes, text and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn with_text(name: &str, text: impl ToString) -> Self {
        Self { name: name.to_string(), text: text.to_string(), ..Default::default() }
    }

    pub fn push(&mut self, child: XmlElement) -> &mut Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Child that must be present
    pub fn required_child(&self, name: &str) -> Result<&XmlElement> {
        self.child(name).ok_or_else(|| {
            AttackGraphError::Format(format!("<{}> has no <{}> child", self.name, name))
        })
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }

    pub fn required_child_text(&self, name: &str) -> Result<&str> {
        Ok(self.required_child(name)?.text.as_str())
    }

    /// Parse a document and return its root element
    pub fn parse(content: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    let finished = stack
                        .pop()
                        .ok_or_else(|| AttackGraphError::Format("Unbalanced XML document".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => return Ok(finished),
                    }
                }
                Event::Eof => {
                    return Err(AttackGraphError::Format("XML document has no root element".to_string()))
                }
                _ => {}
            }
        }
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_to(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.text.is_empty() && self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        if !self.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        element.attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            attribute.unescape_value()?.into_owned(),
        ));
    }
    Ok(element)
}
