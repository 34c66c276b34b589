//! CASE expression builder.

use crate::sql::expr::Expr;
use crate::value::Value;

use super::ParamBag;

/// Builds a CASE expression, capturing THEN/ELSE values on the parent
/// builder's parameter bag.
///
/// Obtained through a parent builder's `case()`; `end()` returns the
/// finished [`Expr`] for use in a projection or predicate.
#[must_use = "CaseBuilder has no effect until end() is called"]
pub struct CaseBuilder<'a> {
    params: &'a mut ParamBag,
    operand: Option<Expr>,
    when_clauses: Vec<(Expr, Expr)>,
    else_clause: Option<Expr>,
}

impl<'a> CaseBuilder<'a> {
    pub(crate) fn new(params: &'a mut ParamBag) -> Self {
        Self {
            params,
            operand: None,
            when_clauses: Vec::new(),
            else_clause: None,
        }
    }

    /// Set the CASE operand (`CASE expr WHEN ...`).
    pub fn operand(mut self, expr: Expr) -> Self {
        self.operand = Some(expr);
        self
    }

    /// Append a WHEN arm; the value is captured as a parameter.
    pub fn when(mut self, condition: Expr, value: impl Into<Value>) -> Self {
        let name = self.params.add(value, Some("case"));
        self.when_clauses
            .push((condition, Expr::Placeholder { name }));
        self
    }

    /// Append a WHEN arm with an expression result (no capture).
    pub fn when_expr(mut self, condition: Expr, result: Expr) -> Self {
        self.when_clauses.push((condition, result));
        self
    }

    /// Set the ELSE default; the value is captured as a parameter.
    pub fn else_(mut self, value: impl Into<Value>) -> Self {
        let name = self.params.add(value, Some("case"));
        self.else_clause = Some(Expr::Placeholder { name });
        self
    }

    /// Set the ELSE default to an expression (no capture).
    pub fn else_expr(mut self, result: Expr) -> Self {
        self.else_clause = Some(result);
        self
    }

    /// Finish, returning the CASE expression.
    pub fn end(self) -> Expr {
        Expr::Case {
            operand: self.operand.map(Box::new),
            when_clauses: self.when_clauses,
            else_clause: self.else_clause.map(Box::new),
        }
    }
}
