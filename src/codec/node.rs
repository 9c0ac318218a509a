//! Minimal element tree with a small path evaluator
//!
//! Documents are parsed once with `quick-xml` into an owned tree. While the
//! tree is built every element records a [`NodeView`] describing what its first
//! child is, so path lookups never need to re-inspect node kinds at query time.
//!
//! Supported paths: `/qos/state/@id`, `/qos/priority/text()`,
//! `/qos/clientProperty[@name='x']`, `qos/persistent` (leading slash optional).

use crate::codec::escape::{escape_attr, escape_text, unescape};
use crate::error::{ClientError, ClientResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Cdata(String),
}

/// What an element offers to a path lookup, decided by its first child
#[derive(Debug, Clone, PartialEq)]
pub enum NodeView {
    /// No children at all, e.g. `<persistent/>`
    Empty,
    /// First child is text
    ElementWithText(String),
    /// First child is a CDATA section, returned literally
    Cdata(String),
    /// First child is an element; carries the outer markup of this element
    ElementWithChildren(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    view: NodeView,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> ClientResult<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr
                .map_err(|e| ClientError::malformed(format!("bad attribute in <{name}>: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = unescape(&String::from_utf8_lossy(&attr.value));
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            view: NodeView::Empty,
        })
    }

    fn finish(mut self) -> Self {
        self.view = match self.children.first() {
            None => NodeView::Empty,
            Some(Node::Text(text)) => NodeView::ElementWithText(text.clone()),
            Some(Node::Cdata(text)) => NodeView::Cdata(text.clone()),
            Some(Node::Element(_)) => NodeView::ElementWithChildren(self.to_xml()),
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> &NodeView {
        &self.view
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Concatenated text and CDATA content of the direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(t) | Node::Cdata(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Outer markup of this element
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("='");
            out.push_str(&escape_attr(value));
            out.push('\'');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_xml(out),
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Cdata(text) => {
                    out.push_str("<![CDATA[");
                    out.push_str(text);
                    out.push_str("]]>");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A node selected by a path
#[derive(Debug, Clone, Copy)]
pub enum Selected<'a> {
    Attribute(&'a str),
    Text(&'a str),
    Element(&'a Element),
}

#[derive(Debug, PartialEq)]
enum Step<'p> {
    Child {
        name: &'p str,
        predicate: Option<(&'p str, String)>,
    },
    Attribute(&'p str),
    Text,
}

fn parse_steps(path: &str) -> Vec<Step<'_>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|step| {
            if step == "text()" {
                Step::Text
            } else if let Some(attr) = step.strip_prefix('@') {
                Step::Attribute(attr)
            } else if let Some((name, rest)) = step.split_once('[') {
                Step::Child {
                    name,
                    predicate: parse_predicate(rest.trim_end_matches(']')),
                }
            } else {
                Step::Child {
                    name: step,
                    predicate: None,
                }
            }
        })
        .collect()
}

fn parse_predicate(pred: &str) -> Option<(&str, String)> {
    let (attr, value) = pred.strip_prefix('@')?.split_once('=')?;
    let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
    Some((attr.trim(), value.to_string()))
}

fn step_matches(el: &Element, name: &str, predicate: &Option<(&str, String)>) -> bool {
    (name == "*" || el.name == name)
        && predicate
            .as_ref()
            .map_or(true, |(attr, value)| el.attribute(attr) == Some(value.as_str()))
}

/// Parsed QoS or Key document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlDocument {
    root: Option<Element>,
}

impl XmlDocument {
    /// Parse a document; an empty or whitespace-only input yields an empty document
    pub fn parse(xml: &str) -> ClientResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        // Whitespace is only content when it is all an element holds
        let mut pending_space: Option<String> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                ClientError::malformed(format!(
                    "XML parse error at position {}: {e}",
                    reader.buffer_position()
                ))
            })?;
            if !matches!(event, Event::Text(_) | Event::End(_)) {
                pending_space = None;
            }
            match event {
                Event::Start(start) => stack.push(Element::open(&start)?),
                Event::Empty(start) => {
                    let el = Element::open(&start)?.finish();
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    if let (Some(space), Some(open)) = (pending_space.take(), stack.last_mut()) {
                        if open.children.is_empty() {
                            open.children.push(Node::Text(space));
                        }
                    }
                    let el = stack
                        .pop()
                        .ok_or_else(|| ClientError::malformed("unexpected closing tag"))?
                        .finish();
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    let text = unescape(&String::from_utf8_lossy(&text));
                    if text.trim().is_empty() {
                        if !stack.is_empty() {
                            pending_space.get_or_insert_with(String::new).push_str(&text);
                        }
                        continue;
                    }
                    pending_space = None;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None => {
                            return Err(ClientError::malformed(
                                "text content outside of the root element",
                            ))
                        }
                    }
                }
                Event::CData(cdata) => {
                    let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Cdata(text)),
                        None => {
                            return Err(ClientError::malformed(
                                "CDATA section outside of the root element",
                            ))
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ClientError::malformed(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Outer markup of the root element, empty for an empty document
    pub fn to_xml(&self) -> String {
        self.root.as_ref().map(Element::to_xml).unwrap_or_default()
    }

    /// All nodes matching `path`, in document order
    pub fn select(&self, path: &str) -> Vec<Selected<'_>> {
        let Some(root) = self.root.as_ref() else {
            return Vec::new();
        };
        let steps = parse_steps(path);
        let Some((first, rest)) = steps.split_first() else {
            return Vec::new();
        };

        let mut current: Vec<&Element> = match first {
            Step::Child { name, predicate } if step_matches(root, name, predicate) => vec![root],
            _ => return Vec::new(),
        };

        for (idx, step) in rest.iter().enumerate() {
            let last = idx + 1 == rest.len();
            match step {
                Step::Child { name, predicate } => {
                    current = current
                        .into_iter()
                        .flat_map(|el| el.child_elements())
                        .filter(|el| step_matches(el, name, predicate))
                        .collect();
                }
                Step::Attribute(attr) if last => {
                    return current
                        .into_iter()
                        .filter_map(|el| el.attribute(attr))
                        .map(Selected::Attribute)
                        .collect();
                }
                Step::Text if last => {
                    return current
                        .into_iter()
                        .flat_map(|el| el.children.iter())
                        .filter_map(|child| match child {
                            Node::Text(t) | Node::Cdata(t) => Some(Selected::Text(t.as_str())),
                            Node::Element(_) => None,
                        })
                        .collect();
                }
                _ => return Vec::new(),
            }
        }

        current.into_iter().map(Selected::Element).collect()
    }

    /// Resolve `path` to a string, or `None` when no node yields a value
    ///
    /// Attributes and text nodes give their value. An element gives its CDATA
    /// content when that is its first child, or its own markup when its first
    /// child is an element. Other elements are skipped.
    pub fn get_xpath_opt(&self, path: &str) -> Option<String> {
        self.select(path).into_iter().find_map(|selected| match selected {
            Selected::Attribute(value) | Selected::Text(value) => Some(value.to_string()),
            Selected::Element(el) => match &el.view {
                NodeView::Cdata(text) | NodeView::ElementWithChildren(text) => Some(text.clone()),
                NodeView::ElementWithText(_) | NodeView::Empty => None,
            },
        })
    }

    pub fn get_xpath(&self, path: &str, default: &str) -> String {
        self.get_xpath_opt(path)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_xpath_i64(&self, path: &str, default: i64) -> i64 {
        self.get_xpath_opt(path)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn get_xpath_i32(&self, path: &str, default: i32) -> i32 {
        self.get_xpath_opt(path)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Boolean lookup that treats a present empty tag like `<persistent/>` as true
    pub fn get_xpath_bool(&self, path: &str, default: bool) -> bool {
        let path = path.strip_suffix("/text()").unwrap_or(path);
        let value = self.select(path).into_iter().find_map(|selected| match selected {
            Selected::Attribute(value) | Selected::Text(value) => Some(value.to_string()),
            Selected::Element(el) => match &el.view {
                NodeView::ElementWithText(text) if !text.trim().is_empty() => Some(text.clone()),
                _ => Some("true".to_string()),
            },
        });
        match value {
            Some(v) => parse_bool(&v).unwrap_or(default),
            None => default,
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> ClientResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(el));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(ClientError::malformed("document has more than one root element")),
    }
}
