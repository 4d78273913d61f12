//! Human-readable type rendering, used in tracing output, diagnostics
//! payload rendering and tests.

use crate::intern::TypeInterner;
use crate::types::*;

pub struct TypeFormatter<'a> {
    db: &'a TypeInterner,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(db: &'a TypeInterner) -> Self {
        TypeFormatter { db }
    }

    pub fn format(&self, ty: TypeId) -> String {
        let mut out = String::new();
        self.write(ty, &mut out);
        out
    }

    pub fn format_list(&self, types: &[TypeId]) -> String {
        types
            .iter()
            .map(|&ty| self.format(ty))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn write(&self, ty: TypeId, out: &mut String) {
        let Some(data) = self.db.lookup(ty) else {
            out.push_str("<ERROR>");
            return;
        };
        match data {
            TypeData::Error => out.push_str("<ERROR>"),
            TypeData::Nothing => out.push_str("Nothing"),
            TypeData::Class { class, args } => {
                match self.db.class_info(class) {
                    Some(info) => out.push_str(&self.db.resolve_atom(info.name)),
                    None => out.push_str("<unknown class>"),
                }
                if !args.is_empty() {
                    out.push('<');
                    out.push_str(&self.format_list(&args));
                    out.push('>');
                }
            }
            TypeData::Nullable(inner) => {
                let needs_parens = matches!(
                    self.db.lookup(inner),
                    Some(TypeData::Function(_) | TypeData::Intersection(_))
                );
                if needs_parens {
                    out.push('(');
                }
                self.write(inner, out);
                if needs_parens {
                    out.push(')');
                }
                out.push('?');
            }
            TypeData::Param(param) => {
                out.push_str(&self.db.resolve_atom(self.db.type_param_name(param)));
            }
            TypeData::Var(var) => {
                let name = self.db.type_var_name(var);
                out.push_str("TypeVariable(");
                if name.is_none() {
                    out.push_str(&format!("#{}", var.0));
                } else {
                    out.push_str(&self.db.resolve_atom(name));
                }
                out.push(')');
            }
            TypeData::Function(function) => {
                if let Some(receiver) = function.receiver {
                    self.write(receiver, out);
                    out.push('.');
                }
                out.push('(');
                out.push_str(&self.format_list(&function.params));
                out.push_str(") -> ");
                self.write(function.ret, out);
            }
            TypeData::Intersection(members) => {
                for (index, &member) in members.iter().enumerate() {
                    if index > 0 {
                        out.push_str(" & ");
                    }
                    self.write(member, out);
                }
            }
            TypeData::IntegerLiteral(value) => {
                out.push_str(&format!("IntegerLiteralType({value})"));
            }
        }
    }
}
