//! McPAT template document model.
//!
//! A template is an ordered, attributed tree of `component`, `param` and
//! `stat` elements. Comments and processing instructions are kept as nodes
//! so they survive a parse/serialize round trip.

mod xml;

use std::fs;
use std::path::Path;

use log::info;

/// Errors that can occur while reading or writing a template
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("Invalid attribute on <{tag}>: {message}")]
    Attribute { tag: String, message: String },

    #[error("Unbalanced XML: {0}")]
    Unbalanced(String),

    #[error("Failed to write XML: {0}")]
    Write(String),

    #[error("Template I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of elements the pipeline cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Component,
    Param,
    Stat,
    Other,
}

/// A single node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Comment(String),
    ProcessingInstruction(String),
    Text(String),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// An element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        match self.tag.as_str() {
            "component" => NodeKind::Component,
            "param" => NodeKind::Param,
            "stat" => NodeKind::Stat,
            _ => NodeKind::Other,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its position if it already exists
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.attr("name")
    }

    pub fn value(&self) -> Option<&str> {
        self.attr("value")
    }

    /// Direct element children, skipping comments and text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Pre-order visit of this element and every descendant element
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Pre-order mutable visit that stops at the first error
    pub fn try_walk_mut<E>(
        &mut self,
        visit: &mut impl FnMut(&mut Element) -> Result<(), E>,
    ) -> Result<(), E> {
        visit(self)?;
        for child in self.elements_mut() {
            child.try_walk_mut(visit)?;
        }
        Ok(())
    }

    fn find(&self, predicate: &impl Fn(&Element) -> bool) -> Option<&Element> {
        if predicate(self) {
            return Some(self);
        }
        self.elements().find_map(|child| child.find(predicate))
    }

    fn find_mut(&mut self, predicate: &impl Fn(&Element) -> bool) -> Option<&mut Element> {
        if predicate(self) {
            return Some(self);
        }
        for child in self.elements_mut() {
            if let Some(found) = child.find_mut(predicate) {
                return Some(found);
            }
        }
        None
    }
}

/// `<?xml ...?>` declaration of the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A parsed template: optional declaration plus top-level nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub declaration: Option<XmlDeclaration>,
    pub nodes: Vec<Node>,
}

fn is_system(element: &Element) -> bool {
    element.kind() == NodeKind::Component && element.attr("id") == Some("system")
}

impl Document {
    /// Parse a template from XML text
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        xml::parse_document(text)
    }

    /// Load a template from disk
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        info!("Loading McPAT template from: {:?}", path);
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Serialize with two-space indentation
    pub fn to_xml_string(&self) -> Result<String, TemplateError> {
        xml::write_document(self)
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), TemplateError> {
        fs::write(path, self.to_xml_string()?)?;
        Ok(())
    }

    /// The document element
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// The `system` component whose children describe the whole chip.
    ///
    /// This is the component with `id="system"`, or failing that the first
    /// component below the document element.
    pub fn system_component(&self) -> Option<&Element> {
        let root = self.root()?;
        root.find(&is_system).or_else(|| {
            root.elements()
                .find(|element| element.kind() == NodeKind::Component)
        })
    }

    pub fn system_component_mut(&mut self) -> Option<&mut Element> {
        let by_id = self.root().and_then(|root| root.find(&is_system)).is_some();
        let root = self.root_mut()?;
        if by_id {
            root.find_mut(&is_system)
        } else {
            root.elements_mut()
                .find(|element| element.kind() == NodeKind::Component)
        }
    }

    /// Pre-order visit of every element in the document
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        for node in &self.nodes {
            if let Node::Element(element) = node {
                element.walk(visit);
            }
        }
    }

    pub fn try_walk_mut<E>(
        &mut self,
        visit: &mut impl FnMut(&mut Element) -> Result<(), E>,
    ) -> Result<(), E> {
        for node in &mut self.nodes {
            if let Node::Element(element) = node {
                element.try_walk_mut(visit)?;
            }
        }
        Ok(())
    }
}
