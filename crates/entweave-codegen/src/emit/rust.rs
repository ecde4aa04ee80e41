//! Rust source emitter
//!
//! Renders every woven entity class as a struct over its storage slots:
//! accessors read and write slots, and classes whose hierarchy got
//! synthesized equality implement `PartialEq`, `Eq` and `Hash` on the
//! identity column.

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use entweave_core::decl::{ClassDecl, Member, MethodKind};
use entweave_core::{Module, WEAVER_VERSION};

use super::{Emitter, inherited_method};
use crate::error::{Error, Result};

/// Emits Rust source
pub struct RustEmitter;

impl Emitter for RustEmitter {
    fn emit(&self, module: &Module) -> Result<Vec<u8>> {
        Ok(render(module)?.into_bytes())
    }
}

/// Render the woven module as a formatted Rust file
pub fn render(module: &Module) -> Result<String> {
    let module_name = &module.module;
    let classes = module
        .classes
        .iter()
        .filter(|class| class.entity && class.storage.is_some())
        .map(|class| class_tokens(module, class));

    let tokens = quote! {
        #![allow(dead_code)]

        use serde_json::Value;

        pub const MODULE: &str = #module_name;
        pub const WEAVER: &str = #WEAVER_VERSION;

        /// Object with an identity column
        pub trait Entity {
            /// Value of the identity column
            fn identity(&self) -> &Value;
        }

        #(#classes)*
    };

    let file: syn::File =
        syn::parse2(tokens).map_err(|err| Error::Generation(err.to_string()))?;
    Ok(format!(
        "// Generated by entweave {WEAVER_VERSION} from module '{module_name}'. Do not edit.\n\n{}",
        prettyplease::unparse(&file)
    ))
}

// Whether any property named `member` in the class or its local bases has no setter
fn is_read_only(module: &Module, class: &ClassDecl, member: &str) -> bool {
    let mut current = Some(class);
    let mut hops = 0;
    while let Some(decl) = current {
        let read_only = decl.members.iter().any(|m| match m {
            Member::Property { property } => property.name == member && property.read_only,
            _ => false,
        });
        if read_only {
            return true;
        }
        hops += 1;
        if hops > module.classes.len() {
            break;
        }
        current = decl.extends.as_deref().and_then(|base| module.class(base));
    }
    false
}

fn class_tokens(module: &Module, class: &ClassDecl) -> TokenStream {
    let Some(storage) = class.storage.as_ref() else {
        return TokenStream::new();
    };
    let ident = format_ident!("{}", class.simple_name());
    let qualified = &class.name;
    let slot_count = Literal::usize_unsuffixed(storage.slots.len());

    let accessors = storage.slots.iter().map(|slot| {
        let index = Literal::usize_unsuffixed(slot.index);
        let getter = format_ident!("{}", slot.name);
        let doc = format!(" `{}`, stored in slot {}", slot.ty, slot.index);
        let setter = if is_read_only(module, class, &slot.name) {
            quote!()
        } else {
            let set = format_ident!("set_{}", slot.name);
            quote! {
                #[doc = #doc]
                pub fn #set(&mut self, value: Value) {
                    self.slots[#index] = value;
                }
            }
        };
        quote! {
            #[doc = #doc]
            pub fn #getter(&self) -> &Value {
                &self.slots[#index]
            }

            #setter
        }
    });

    let equality = inherited_method(module, class, MethodKind::Equality)
        .and_then(|method| method.synthesized)
        .map(|body| {
            let slot = Literal::usize_unsuffixed(body.identity_slot);
            // Identity capability of `other` is guaranteed by its type.
            quote! {
                impl Entity for #ident {
                    fn identity(&self) -> &Value {
                        &self.slots[#slot]
                    }
                }

                impl ::std::cmp::PartialEq for #ident {
                    fn eq(&self, other: &Self) -> bool {
                        if ::std::ptr::eq(self, other) {
                            return true;
                        }
                        self.identity() == other.identity()
                    }
                }

                impl ::std::cmp::Eq for #ident {}

                impl ::std::hash::Hash for #ident {
                    fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                        ::std::hash::Hash::hash(&self.identity().to_string(), state);
                    }
                }
            }
        });

    let class_doc = format!(" Woven `{qualified}`");
    quote! {
        #[doc = #class_doc]
        #[derive(Debug, Clone)]
        pub struct #ident {
            slots: Vec<Value>,
        }

        impl #ident {
            pub const NAME: &'static str = #qualified;
            pub const SLOTS: usize = #slot_count;

            pub fn new() -> Self {
                Self {
                    slots: vec![Value::Null; Self::SLOTS],
                }
            }

            pub fn slots(&self) -> &[Value] {
                &self.slots
            }

            #(#accessors)*
        }

        impl Default for #ident {
            fn default() -> Self {
                Self::new()
            }
        }

        #equality
    }
}
