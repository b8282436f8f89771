//! Markup node model
//!
//! Documents are an arena of nodes linked parent/sibling/child. Every
//! element carries its attributes in a [`Dict`] bound to the document's
//! string pool. Building a tree from markup is left to the caller.

use crate::css::parse_declaration_list;
use crate::dict::Dict;
use crate::error::Result;
use crate::string_pool::{StringPool, StringRef};

/// Element kinds, including the pseudo-elements used for non-element nodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Element {
    Wildcard,
    Comment,
    Doctype,
    Text,
    Unknown,
    A,
    Abbr,
    Address,
    Article,
    Aside,
    B,
    Blockquote,
    Body,
    Br,
    Button,
    Caption,
    Code,
    Col,
    Dd,
    Div,
    Dl,
    Dt,
    Em,
    Footer,
    Form,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Head,
    Header,
    Hr,
    Html,
    I,
    Img,
    Input,
    Label,
    Li,
    Link,
    Main,
    Meta,
    Nav,
    Ol,
    Option,
    P,
    Pre,
    Script,
    Section,
    Select,
    Small,
    Span,
    Strong,
    Style,
    Sub,
    Sup,
    Table,
    Tbody,
    Td,
    Textarea,
    Tfoot,
    Th,
    Thead,
    Title,
    Tr,
    U,
    Ul,
}

const ELEMENTS: [(Element, &str); Element::COUNT] = [
    (Element::Wildcard, "*"),
    (Element::Comment, "!--"),
    (Element::Doctype, "!DOCTYPE"),
    (Element::Text, "#text"),
    (Element::Unknown, "#unknown"),
    (Element::A, "a"),
    (Element::Abbr, "abbr"),
    (Element::Address, "address"),
    (Element::Article, "article"),
    (Element::Aside, "aside"),
    (Element::B, "b"),
    (Element::Blockquote, "blockquote"),
    (Element::Body, "body"),
    (Element::Br, "br"),
    (Element::Button, "button"),
    (Element::Caption, "caption"),
    (Element::Code, "code"),
    (Element::Col, "col"),
    (Element::Dd, "dd"),
    (Element::Div, "div"),
    (Element::Dl, "dl"),
    (Element::Dt, "dt"),
    (Element::Em, "em"),
    (Element::Footer, "footer"),
    (Element::Form, "form"),
    (Element::H1, "h1"),
    (Element::H2, "h2"),
    (Element::H3, "h3"),
    (Element::H4, "h4"),
    (Element::H5, "h5"),
    (Element::H6, "h6"),
    (Element::Head, "head"),
    (Element::Header, "header"),
    (Element::Hr, "hr"),
    (Element::Html, "html"),
    (Element::I, "i"),
    (Element::Img, "img"),
    (Element::Input, "input"),
    (Element::Label, "label"),
    (Element::Li, "li"),
    (Element::Link, "link"),
    (Element::Main, "main"),
    (Element::Meta, "meta"),
    (Element::Nav, "nav"),
    (Element::Ol, "ol"),
    (Element::Option, "option"),
    (Element::P, "p"),
    (Element::Pre, "pre"),
    (Element::Script, "script"),
    (Element::Section, "section"),
    (Element::Select, "select"),
    (Element::Small, "small"),
    (Element::Span, "span"),
    (Element::Strong, "strong"),
    (Element::Style, "style"),
    (Element::Sub, "sub"),
    (Element::Sup, "sup"),
    (Element::Table, "table"),
    (Element::Tbody, "tbody"),
    (Element::Td, "td"),
    (Element::Textarea, "textarea"),
    (Element::Tfoot, "tfoot"),
    (Element::Th, "th"),
    (Element::Thead, "thead"),
    (Element::Title, "title"),
    (Element::Tr, "tr"),
    (Element::U, "u"),
    (Element::Ul, "ul"),
];

impl Element {
    pub const COUNT: usize = Element::Ul as usize + 1;

    /// Look up an element by tag name, ignoring ASCII case.
    ///
    /// Names that are not known element tags map to [`Element::Unknown`].
    pub fn from_name(name: &str) -> Element {
        ELEMENTS[Element::A.index()..]
            .iter()
            .find(|(_, tag)| tag.eq_ignore_ascii_case(name))
            .map_or(Element::Unknown, |&(element, _)| element)
    }

    pub fn name(self) -> &'static str {
        ELEMENTS[self.index()].1
    }

    /// Position of this element in per-element tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether nodes of this kind carry a text value instead of children
    pub fn has_value(self) -> bool {
        matches!(self, Element::Comment | Element::Doctype | Element::Text)
    }
}

/// Handle to a node within one [`Document`].
///
/// Ids are plain indices and are not tied to the document that issued
/// them; an id from another document that happens to be in range is
/// accepted as if it were local.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct Node<'p> {
    element: Element,
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    attrs: Dict<'p>,
    value: Option<StringRef>,
}

impl<'p> Node<'p> {
    pub fn element(&self) -> Element {
        self.element
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    /// Text of a comment, doctype or text node
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn attrs(&self) -> &Dict<'p> {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Dict<'p> {
        &mut self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|value| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) -> Result<()> {
        self.attrs.set(name, value)
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<StringRef> {
        self.attrs.remove(name)
    }

    /// Parse the `style` attribute into a declaration dictionary.
    ///
    /// A missing attribute yields an empty dictionary.
    pub fn style(&self) -> Result<Dict<'p>> {
        let mut props = Dict::new(self.attrs.pool());
        if let Some(style) = self.attrs.get("style") {
            parse_declaration_list(style, &mut props)?;
        }
        Ok(props)
    }
}

/// Document node arena bound to one string pool
#[derive(Debug)]
pub struct Document<'p> {
    pool: &'p StringPool,
    nodes: Vec<Node<'p>>,
    root: Option<NodeId>,
}

impl<'p> Document<'p> {
    pub fn new(pool: &'p StringPool) -> Self {
        Self {
            pool,
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn pool(&self) -> &'p StringPool {
        self.pool
    }

    /// First parentless node created in this document
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of nodes ever created, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<'p>> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<'p>> {
        self.nodes.get_mut(id.0)
    }

    /// Create an element, appended as the last child of `parent`
    pub fn new_element(&mut self, parent: Option<NodeId>, element: Element) -> NodeId {
        self.push(parent, element, None)
    }

    pub fn new_text(&mut self, parent: Option<NodeId>, text: &str) -> Result<NodeId> {
        let value = self.pool.intern(text)?;
        Ok(self.push(parent, Element::Text, Some(value)))
    }

    pub fn new_comment(&mut self, parent: Option<NodeId>, text: &str) -> Result<NodeId> {
        let value = self.pool.intern(text)?;
        Ok(self.push(parent, Element::Comment, Some(value)))
    }

    pub fn new_doctype(&mut self, parent: Option<NodeId>, text: &str) -> Result<NodeId> {
        let value = self.pool.intern(text)?;
        Ok(self.push(parent, Element::Doctype, Some(value)))
    }

    fn push(
        &mut self,
        parent: Option<NodeId>,
        element: Element,
        value: Option<StringRef>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            element,
            parent: None,
            prev_sibling: None,
            next_sibling: None,
            first_child: None,
            last_child: None,
            attrs: Dict::new(self.pool),
            value,
        });

        match parent {
            Some(parent) if self.node(parent).is_some() => self.append(parent, id),
            Some(parent) => {
                log::warn!("parent {:?} not in document; {} left detached", parent, element.name());
            }
            None if self.root.is_none() => self.root = Some(id),
            None => {}
        }
        id
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        let last = self.nodes[parent.0].last_child;
        {
            let node = &mut self.nodes[child.0];
            node.parent = Some(parent);
            node.prev_sibling = last;
        }
        match last {
            Some(last) => self.nodes[last.0].next_sibling = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    /// Detach a node (and its subtree) from its parent and siblings.
    pub fn unlink(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        let parent = node.parent.take();
        let prev = node.prev_sibling.take();
        let next = node.next_sibling.take();

        match prev {
            Some(prev) => self.nodes[prev.0].next_sibling = next,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = next;
                }
            }
        }
        match next {
            Some(next) => self.nodes[next.0].prev_sibling = prev,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].last_child = prev;
                }
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
    }

    /// Iterate the children of a node in document order
    pub fn children(&self, id: NodeId) -> Children<'_, 'p> {
        Children {
            doc: self,
            next: self.node(id).and_then(|node| node.first_child),
        }
    }
}

pub struct Children<'d, 'p> {
    doc: &'d Document<'p>,
    next: Option<NodeId>,
}

impl Iterator for Children<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.node(id).and_then(|node| node.next_sibling);
        Some(id)
    }
}
