// src/pipeline/template.rs - tag templates evaluated with Starlark
use crate::error::{CompilationError, ProcessingError};
use crate::record::{Payload, Record, TagMap};
use anyhow::anyhow;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use starlark::collections::SmallMap;
use starlark::environment::{Globals, GlobalsBuilder, Module};
use starlark::eval::Evaluator;
use starlark::starlark_module;
use starlark::syntax::{AstModule, Dialect};
use starlark::values::dict::Dict;
use starlark::values::Value;

// `.Tags.name` -> missing-safe dict lookup; `.Tags.method(` stays a call
static TAG_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[^\w)\]"'])\.Tags\.(\w+)(\s*\()?"#).expect("tag field pattern")
});

// `.Data`, `.Namespace`, ... -> bound variable
static RECORD_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[^\w)\]"'])\.(Tags|Data|Namespace|Unit|Description|Version|Timestamp)\b"#)
        .expect("record field pattern")
});

fn dialect() -> Dialect {
    Dialect {
        enable_f_strings: true,
        ..Dialect::Extended
    }
}

/// Rewrite Go-template style field references into Starlark.
///
/// Only code is rewritten; string literals are copied through untouched.
pub fn translate_action(action: &str) -> String {
    let mut output = String::with_capacity(action.len());
    let mut code_start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in action.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    output.push_str(&action[code_start..=i]);
                    code_start = i + 1;
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                output.push_str(&rewrite_fields(&action[code_start..i]));
                code_start = i;
                quote = Some(ch);
            }
            None => {}
        }
    }

    let tail = &action[code_start..];
    if quote.is_some() {
        output.push_str(tail);
    } else {
        output.push_str(&rewrite_fields(tail));
    }
    output
}

fn rewrite_fields(code: &str) -> String {
    let with_tags = TAG_FIELD.replace_all(code, |caps: &Captures| match caps.get(3) {
        Some(call) => format!("{}Tags.{}{}", &caps[1], &caps[2], call.as_str()),
        None => format!(r#"{}Tags.get("{}", "")"#, &caps[1], &caps[2]),
    });
    RECORD_FIELD.replace_all(&with_tags, "${1}${2}").into_owned()
}

#[starlark_module]
fn template_functions(builder: &mut GlobalsBuilder) {
    fn regex_match(pattern: String, text: String) -> anyhow::Result<bool> {
        let regex = regex::Regex::new(&pattern)?;
        Ok(regex.is_match(&text))
    }

    fn regex_replace(pattern: String, replacement: String, text: String) -> anyhow::Result<String> {
        let regex = regex::Regex::new(&pattern)?;
        Ok(regex.replace_all(&text, replacement.as_str()).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// `source` is what the user wrote, `expr` the Starlark it became
    Action { source: String, expr: String },
}

/// One named template, split into literal text and `{{ }}` actions
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(name: &str, body: &str) -> Result<Self, CompilationError> {
        let invalid = |message: String| CompilationError::InvalidTemplate {
            name: name.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut rest = body;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| invalid(format!("unclosed '{{{{' in {:?}", body)))?;

            let source = after[..end].trim();
            if source.is_empty() {
                return Err(invalid("empty action '{{ }}'".to_string()));
            }

            let expr = translate_action(source);
            AstModule::parse(name, expr.clone(), &dialect())
                .map_err(|e| invalid(format!("action '{}': {}", source, e)))?;

            segments.push(Segment::Action {
                source: source.to_string(),
                expr,
            });
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Template {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The compiled set of tag templates for one rule
pub struct TagTemplater {
    globals: Globals,
    templates: Vec<Template>,
}

impl TagTemplater {
    /// Compile name -> body pairs. Templates with an empty name are skipped.
    pub fn compile(bodies: &IndexMap<String, String>) -> Result<Self, CompilationError> {
        let templates = bodies
            .iter()
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, body)| Template::parse(name, body))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TagTemplater {
            globals: GlobalsBuilder::standard().with(template_functions).build(),
            templates,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Render every template against `record`, in declaration order.
    ///
    /// All templates see the same tags: whatever the record carries when
    /// this is called. Output of one template is not visible to another.
    pub fn render(&self, record: &Record) -> Result<TagMap, ProcessingError> {
        let mut rendered = TagMap::new();

        for template in &self.templates {
            let value = self
                .render_template(template, record)
                .map_err(|source| ProcessingError::TemplateError {
                    template: template.name.clone(),
                    source,
                })?;
            rendered.insert(template.name.clone(), value);
        }

        Ok(rendered)
    }

    fn render_template(&self, template: &Template, record: &Record) -> anyhow::Result<String> {
        // Fresh module per template so nothing leaks between siblings
        let module = Module::new();
        bind_record(&module, record)?;

        let mut output = String::new();
        for segment in &template.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Action { source, expr } => {
                    let ast = AstModule::parse(&template.name, expr.clone(), &dialect())
                        .map_err(|e| anyhow!("parse error in '{}': {}", source, e))?;
                    let mut eval = Evaluator::new(&module);
                    let value = eval
                        .eval_module(ast, &self.globals)
                        .map_err(|e| anyhow!("evaluation of '{}' failed: {}", source, e))?;
                    output.push_str(&value_to_text(value));
                }
            }
        }

        Ok(output)
    }
}

fn bind_record(module: &Module, record: &Record) -> anyhow::Result<()> {
    let heap = module.heap();

    let mut content = SmallMap::new();
    for (key, value) in record.tags.iter() {
        let key = heap.alloc(key.as_str());
        content.insert_hashed(
            key.get_hashed().map_err(|e| anyhow!("{}", e))?,
            heap.alloc(value.as_str()),
        );
    }
    module.set("Tags", heap.alloc(Dict::new(content)));

    let data = match &record.data {
        Payload::Text(text) => heap.alloc(text.as_str()),
        Payload::Structured(value) => heap.alloc(value.to_string()),
    };
    module.set("Data", data);

    let namespace: Vec<Value> = record
        .namespace
        .iter()
        .map(|element| heap.alloc(element.as_str()))
        .collect();
    module.set("Namespace", heap.alloc(namespace));
    module.set("Version", heap.alloc(record.version));
    module.set("Timestamp", heap.alloc(record.timestamp.to_rfc3339()));
    module.set("Unit", heap.alloc(record.unit.as_str()));
    module.set("Description", heap.alloc(record.description.as_str()));

    Ok(())
}

fn value_to_text(value: Value) -> String {
    if value.is_none() {
        String::new()
    } else if let Some(s) = value.unpack_str() {
        s.to_string()
    } else {
        value.to_string()
    }
}
