//! Mapping call-site arguments to value parameters.
//!
//! Positional arguments fill parameters left to right; a vararg parameter
//! absorbs every following positional argument. After the first named
//! argument only named arguments may follow. A trailing lambda maps to the
//! last parameter. Unfilled parameters must have a default value or be a
//! vararg.

use crate::declarations::ValueParameter;
use crate::expr::ExprId;
use indexmap::IndexMap;
use kres_common::Atom;
use smallvec::SmallVec;

/// Call-site argument as seen by the mapper; the trailing lambda comes last.
#[derive(Clone, Debug, PartialEq)]
pub struct CallArgument {
    pub name: Option<Atom>,
    pub spread: bool,
    pub expr: ExprId,
    pub trailing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MappingErrorKind {
    TooManyArguments,
    NoValueForParameter { parameter: Atom },
    NamedParameterNotFound { name: Atom },
    ArgumentPassedTwice { parameter: Atom },
    MixingNamedAndPositionArguments,
    NonVarargSpread,
    VarargArgumentOutsideParentheses,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MappingError {
    pub kind: MappingErrorKind,
    /// Offending argument; `None` for a missing parameter.
    pub argument: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct ArgumentMapping {
    /// Parameter index of each argument, `None` when unmapped.
    pub parameter_of: Vec<Option<u32>>,
    /// Arguments of each parameter in mapping order.
    by_parameter: IndexMap<u32, SmallVec<[u32; 2]>>,
    pub errors: Vec<MappingError>,
    /// Parameters left to their default values.
    pub defaults_used: Vec<u32>,
}

impl ArgumentMapping {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn arguments_of(&self, parameter: u32) -> &[u32] {
        self.by_parameter
            .get(&parameter)
            .map_or(&[], |args| args.as_slice())
    }

    /// `(argument, parameter)` pairs in argument order.
    pub fn mapped(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.parameter_of
            .iter()
            .enumerate()
            .filter_map(|(argument, parameter)| parameter.map(|p| (argument as u32, p)))
    }

    fn bind(&mut self, argument: u32, parameter: u32) {
        self.parameter_of[argument as usize] = Some(parameter);
        self.by_parameter.entry(parameter).or_default().push(argument);
    }

    fn error(&mut self, kind: MappingErrorKind, argument: Option<u32>) {
        self.errors.push(MappingError { kind, argument });
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MapperState {
    Positional { next: usize },
    NamedOnly,
}

pub fn map_arguments(args: &[CallArgument], params: &[ValueParameter]) -> ArgumentMapping {
    let mut mapping = ArgumentMapping {
        parameter_of: vec![None; args.len()],
        ..ArgumentMapping::default()
    };
    let by_name: IndexMap<Atom, u32> = params
        .iter()
        .enumerate()
        .filter(|(_, param)| !param.name.is_none())
        .map(|(index, param)| (param.name, index as u32))
        .collect();

    let mut state = MapperState::Positional { next: 0 };
    for (index, arg) in args.iter().enumerate() {
        let argument = index as u32;
        if arg.trailing {
            map_trailing_lambda(&mut mapping, argument, params);
            continue;
        }

        if let Some(name) = arg.name {
            state = MapperState::NamedOnly;
            let Some(&parameter) = by_name.get(&name) else {
                mapping.error(MappingErrorKind::NamedParameterNotFound { name }, Some(argument));
                continue;
            };
            if !mapping.arguments_of(parameter).is_empty() {
                mapping.error(MappingErrorKind::ArgumentPassedTwice { parameter: name }, Some(argument));
                continue;
            }
            if arg.spread && !params[parameter as usize].vararg {
                mapping.error(MappingErrorKind::NonVarargSpread, Some(argument));
            }
            mapping.bind(argument, parameter);
            continue;
        }

        let MapperState::Positional { next } = state else {
            mapping.error(MappingErrorKind::MixingNamedAndPositionArguments, Some(argument));
            continue;
        };
        let Some(param) = params.get(next) else {
            mapping.error(MappingErrorKind::TooManyArguments, Some(argument));
            continue;
        };
        if arg.spread && !param.vararg {
            mapping.error(MappingErrorKind::NonVarargSpread, Some(argument));
        }
        mapping.bind(argument, next as u32);
        if !param.vararg {
            state = MapperState::Positional { next: next + 1 };
        }
    }

    for (index, param) in params.iter().enumerate() {
        let parameter = index as u32;
        if !mapping.arguments_of(parameter).is_empty() {
            continue;
        }
        if param.has_default {
            mapping.defaults_used.push(parameter);
        } else if !param.vararg {
            mapping.error(
                MappingErrorKind::NoValueForParameter {
                    parameter: param.name,
                },
                None,
            );
        }
    }
    mapping
}

fn map_trailing_lambda(mapping: &mut ArgumentMapping, argument: u32, params: &[ValueParameter]) {
    let Some(last) = params.len().checked_sub(1) else {
        mapping.error(MappingErrorKind::TooManyArguments, Some(argument));
        return;
    };
    let parameter = last as u32;
    if params[last].vararg {
        mapping.error(MappingErrorKind::VarargArgumentOutsideParentheses, Some(argument));
        return;
    }
    if !mapping.arguments_of(parameter).is_empty() {
        mapping.error(MappingErrorKind::TooManyArguments, Some(argument));
        return;
    }
    mapping.bind(argument, parameter);
}

#[cfg(test)]
#[path = "../tests/argument_mapping_tests.rs"]
mod tests;
