//! Typed markup tree for CGX templates.
//!
//! A tolerant, dependency-free parser that turns template markup into a tree
//! of tagged nodes (element, text, comment) with classified attributes. The
//! parser never fails: malformed constructs are skipped or closed implicitly,
//! and expression-level problems are left to the reference extractor, which
//! reports them as non-fatal diagnostics.
//!
//! All spans are byte ranges into the template region's markup text.

use std::ops::Range;

/// How an attribute's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// Plain string value, no embedded expression.
    Static,
    /// Bound expression: `:prop="expr"`, `v-bind:prop="expr"`, `v-if`,
    /// `v-else-if`, `v-show`, `v-model`.
    Expression,
    /// Event handler naming a callable: `@event="handler"`, `v-on:event`.
    EventHandler,
    /// Loop directive: `v-for="item in iterable"`.
    For,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub name_span: Range<usize>,
    pub value: Option<String>,
    pub value_span: Option<Range<usize>>,
    pub kind: AttrKind,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub name_span: Range<usize>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub self_closing: bool,
}

#[derive(Debug, Clone)]
pub struct Text {
    pub content: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
}

/// Explicit visitor over the markup tree.
pub trait MarkupVisitor {
    fn visit_element(&mut self, _element: &Element) {}
    fn visit_attribute(&mut self, _element: &Element, _attribute: &Attribute) {}
    fn visit_text(&mut self, _text: &Text) {}
    fn visit_comment(&mut self, _comment: &Comment) {}
}

/// Walk the tree depth-first, visiting each element, its attributes, then
/// its children.
pub fn walk(nodes: &[Node], visitor: &mut dyn MarkupVisitor) {
    for node in nodes {
        match node {
            Node::Element(element) => {
                visitor.visit_element(element);
                for attribute in &element.attributes {
                    visitor.visit_attribute(element, attribute);
                }
                walk(&element.children, visitor);
            }
            Node::Text(text) => visitor.visit_text(text),
            Node::Comment(comment) => visitor.visit_comment(comment),
        }
    }
}

/// Classify an attribute name into its value interpretation.
fn classify(name: &str) -> AttrKind {
    if name.starts_with(':') || name.starts_with("v-bind:") {
        return AttrKind::Expression;
    }
    if name.starts_with('@') || name.starts_with("v-on:") {
        return AttrKind::EventHandler;
    }
    match name {
        "v-if" | "v-else-if" | "v-show" | "v-model" => AttrKind::Expression,
        "v-for" => AttrKind::For,
        _ => AttrKind::Static,
    }
}

/// Parse markup into a node tree.
pub fn parse(markup: &str) -> Vec<Node> {
    Parser {
        src: markup,
        pos: 0,
        root: Vec::new(),
        stack: Vec::new(),
    }
    .run()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    root: Vec<Node>,
    stack: Vec<Element>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Vec<Node> {
        while self.pos < self.src.len() {
            match self.src[self.pos..].find('<') {
                None => {
                    self.text_node(self.pos, self.src.len());
                    break;
                }
                Some(rel) => {
                    let lt = self.pos + rel;
                    self.text_node(self.pos, lt);
                    let rest = &self.src[lt..];
                    if rest.starts_with("<!--") {
                        self.pos = lt;
                        self.comment();
                    } else if rest.starts_with("</") {
                        self.pos = lt;
                        self.close_tag();
                    } else if rest[1..]
                        .chars()
                        .next()
                        .map(|c| c.is_ascii_alphabetic())
                        .unwrap_or(false)
                    {
                        self.pos = lt;
                        self.open_tag();
                    } else {
                        // Stray '<' becomes text.
                        self.text_node(lt, lt + 1);
                        self.pos = lt + 1;
                    }
                }
            }
        }

        // Implicitly close anything left open.
        while let Some(element) = self.stack.pop() {
            self.push_node(Node::Element(element));
        }
        self.root
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn text_node(&mut self, start: usize, end: usize) {
        let slice = &self.src[start..end];
        if !slice.trim().is_empty() {
            self.push_node(Node::Text(Text {
                content: slice.to_string(),
                span: start..end,
            }));
        }
    }

    fn comment(&mut self) {
        let start = self.pos;
        let end = match self.src[start + 4..].find("-->") {
            Some(rel) => start + 4 + rel + 3,
            None => self.src.len(),
        };
        self.push_node(Node::Comment(Comment { span: start..end }));
        self.pos = end;
    }

    fn close_tag(&mut self) {
        let start = self.pos;
        let end = match self.src[start..].find('>') {
            Some(rel) => start + rel,
            None => self.src.len(),
        };
        let name = self.src[start + 2..end].trim();
        self.pos = (end + 1).min(self.src.len());

        if let Some(depth) = self.stack.iter().rposition(|e| e.name == name) {
            while self.stack.len() > depth {
                let element = self.stack.pop().unwrap();
                self.push_node(Node::Element(element));
            }
        }
        // A close tag with no matching open is ignored.
    }

    fn open_tag(&mut self) {
        let name_start = self.pos + 1;
        let name_end = name_start
            + self.src[name_start..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
                .unwrap_or(self.src.len() - name_start);

        let mut element = Element {
            name: self.src[name_start..name_end].to_string(),
            name_span: name_start..name_end,
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        };
        self.pos = name_end;

        loop {
            self.skip_whitespace();
            let rest = &self.src[self.pos..];
            if rest.is_empty() {
                // Unterminated tag: treat as self-closing.
                element.self_closing = true;
                self.push_node(Node::Element(element));
                return;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                element.self_closing = true;
                self.push_node(Node::Element(element));
                return;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                self.stack.push(element);
                return;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            if let Some(attribute) = self.attribute() {
                element.attributes.push(attribute);
            }
        }
    }

    fn attribute(&mut self) -> Option<Attribute> {
        let name_start = self.pos;
        let name_end = name_start
            + self.src[name_start..]
                .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
                .unwrap_or(self.src.len() - name_start);
        if name_end == name_start {
            // Unparsable byte; skip it so the scan always advances.
            self.pos += 1;
            return None;
        }
        let name = &self.src[name_start..name_end];
        self.pos = name_end;
        self.skip_whitespace();

        let (value, value_span) = if self.src[self.pos..].starts_with('=') {
            self.pos += 1;
            self.skip_whitespace();
            self.attribute_value()
        } else {
            (None, None)
        };

        Some(Attribute {
            name: name.to_string(),
            name_span: name_start..name_end,
            value,
            value_span,
            kind: classify(name),
        })
    }

    fn attribute_value(&mut self) -> (Option<String>, Option<Range<usize>>) {
        let rest = &self.src[self.pos..];
        let quote = rest.chars().next();
        match quote {
            Some(q @ ('"' | '\'')) => {
                let value_start = self.pos + 1;
                match self.src[value_start..].find(q) {
                    Some(rel) => {
                        let value_end = value_start + rel;
                        self.pos = value_end + 1;
                        (
                            Some(self.src[value_start..value_end].to_string()),
                            Some(value_start..value_end),
                        )
                    }
                    None => {
                        // Unterminated quote: value runs to the end of the tag.
                        let value_end = self.src[value_start..]
                            .find('>')
                            .map(|rel| value_start + rel)
                            .unwrap_or(self.src.len());
                        self.pos = value_end;
                        (
                            Some(self.src[value_start..value_end].to_string()),
                            Some(value_start..value_end),
                        )
                    }
                }
            }
            Some(_) => {
                let value_start = self.pos;
                let value_end = value_start
                    + self.src[value_start..]
                        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                        .unwrap_or(self.src.len() - value_start);
                self.pos = value_end;
                (
                    Some(self.src[value_start..value_end].to_string()),
                    Some(value_start..value_end),
                )
            }
            None => (None, None),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }
}
