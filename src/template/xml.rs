//! quick-xml bridge for the template model.

use std::fmt::Display;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{Document, Element, Node, TemplateError, XmlDeclaration};

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn read_declaration(decl: &BytesDecl<'_>) -> XmlDeclaration {
    let version = decl
        .version()
        .map(|v| lossy(&v))
        .unwrap_or_else(|_| "1.0".to_string());
    let encoding = decl.encoding().and_then(Result::ok).map(|e| lossy(&e));
    let standalone = decl.standalone().and_then(Result::ok).map(|s| lossy(&s));
    XmlDeclaration {
        version,
        encoding,
        standalone,
    }
}

fn read_element(start: &BytesStart<'_>) -> Result<Element, TemplateError> {
    let mut element = Element::new(lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TemplateError::Attribute {
            tag: element.tag.clone(),
            message: e.to_string(),
        })?;
        let key = lossy(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map_err(|e| TemplateError::Attribute {
                tag: element.tag.clone(),
                message: e.to_string(),
            })?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Attach a finished node to the innermost open element, or to the top level
fn attach(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

pub(super) fn parse_document(text: &str) -> Result<Document, TemplateError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut declaration = None;
    let mut top: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(TemplateError::Parse {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
        };

        match event {
            Event::Decl(decl) => declaration = Some(read_declaration(&decl)),
            Event::Start(start) => stack.push(read_element(&start)?),
            Event::Empty(start) => {
                let element = read_element(&start)?;
                attach(&mut stack, &mut top, Node::Element(element));
            }
            Event::End(end) => {
                let element = stack.pop().ok_or_else(|| {
                    TemplateError::Unbalanced(format!(
                        "unexpected </{}>",
                        lossy(end.name().as_ref())
                    ))
                })?;
                attach(&mut stack, &mut top, Node::Element(element));
            }
            Event::Comment(comment) => {
                attach(&mut stack, &mut top, Node::Comment(lossy(&comment)));
            }
            Event::PI(pi) => {
                attach(&mut stack, &mut top, Node::ProcessingInstruction(lossy(&pi)));
            }
            Event::Text(content) => {
                let content = content.unescape().map_err(|e| TemplateError::Parse {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })?;
                if !content.trim().is_empty() {
                    attach(&mut stack, &mut top, Node::Text(content.into_owned()));
                }
            }
            Event::CData(data) => {
                attach(&mut stack, &mut top, Node::Text(lossy(&data)));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(TemplateError::Unbalanced(format!("<{}> is never closed", open.tag)));
    }

    Ok(Document { declaration, nodes: top })
}

fn write_error(e: impl Display) -> TemplateError {
    TemplateError::Write(e.to_string())
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<(), TemplateError> {
    match node {
        Node::Element(element) => {
            let mut start = BytesStart::new(element.tag.as_str());
            for (key, value) in &element.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }

            if element.children.is_empty() {
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            } else {
                writer.write_event(Event::Start(start)).map_err(write_error)?;
                for child in &element.children {
                    write_node(writer, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
                    .map_err(write_error)?;
            }
        }
        Node::Comment(comment) => writer
            .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
            .map_err(write_error)?,
        Node::ProcessingInstruction(pi) => writer
            .write_event(Event::PI(BytesPI::new(pi.as_str())))
            .map_err(write_error)?,
        Node::Text(content) => writer
            .write_event(Event::Text(BytesText::new(content.as_str())))
            .map_err(write_error)?,
    }
    Ok(())
}

pub(super) fn write_document(document: &Document) -> Result<String, TemplateError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    if let Some(decl) = &document.declaration {
        let event = BytesDecl::new(
            &decl.version,
            decl.encoding.as_deref(),
            decl.standalone.as_deref(),
        );
        writer.write_event(Event::Decl(event)).map_err(write_error)?;
    }

    for node in &document.nodes {
        write_node(&mut writer, node)?;
    }

    let mut text = String::from_utf8(writer.into_inner()).map_err(write_error)?;
    text.push('\n');
    Ok(text)
}
