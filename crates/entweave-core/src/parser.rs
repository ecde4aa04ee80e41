//! Module parser
//!
//! Parses module YAML into the declaration tree and checks the rules serde
//! cannot express: identifier syntax and required values.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::decl::{Member, Module};
use crate::error::{Error, Result};

static QUALIFIED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .unwrap_or_else(|err| unreachable!("qualified name pattern is valid: {err}"))
});

static MEMBER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .unwrap_or_else(|err| unreachable!("member name pattern is valid: {err}"))
});

/// Parser for module files
#[derive(Debug, Default, Clone, Copy)]
pub struct Parser;

impl Parser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a module file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Module> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_bytes(&content)
    }

    /// Parse raw module bytes
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Module> {
        let module: Module = serde_yaml::from_slice(bytes)?;
        self.validate(&module)?;
        Ok(module)
    }

    /// Parse a YAML string
    pub fn parse_yaml(&self, yaml: &str) -> Result<Module> {
        self.parse_bytes(yaml.as_bytes())
    }

    fn validate(&self, module: &Module) -> Result<()> {
        check_qualified("module", &module.module)?;

        for (i, class) in module.classes.iter().enumerate() {
            let location = format!("classes[{i}]");
            check_qualified(&location, &class.name)?;
            if let Some(base) = &class.extends {
                check_qualified(&format!("{location}.extends"), base)?;
            }
            if let Some(kind) = &class.kind {
                check_qualified(&format!("{location}.kind"), kind)?;
            }

            for (j, member) in class.members.iter().enumerate() {
                let location = format!("{location}.members[{j}]");
                check_member(&location, member.name())?;
                match member {
                    Member::Field { field } => check_type(&location, &field.ty)?,
                    Member::Property { property } => {
                        check_type(&location, &property.ty)?;
                        if let Some(backing) = &property.backing {
                            check_member(&format!("{location}.backing"), backing)?;
                        }
                    }
                    Member::Method { .. } => {}
                }
            }
        }

        Ok(())
    }
}

fn check_qualified(location: &str, name: &str) -> Result<()> {
    if QUALIFIED_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidDeclaration {
            location: location.to_string(),
            message: format!("'{name}' is not a valid qualified name"),
        })
    }
}

fn check_member(location: &str, name: &str) -> Result<()> {
    if MEMBER_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidDeclaration {
            location: location.to_string(),
            message: format!("'{name}' is not a valid member name"),
        })
    }
}

fn check_type(location: &str, ty: &str) -> Result<()> {
    if ty.trim().is_empty() {
        Err(Error::InvalidDeclaration {
            location: location.to_string(),
            message: "member type must not be empty".to_string(),
        })
    } else {
        Ok(())
    }
}
