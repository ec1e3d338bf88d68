//! Cypher recursive-descent parser.
//!
//! One-token lookahead, deterministic. Expressions and WHERE predicates are
//! parsed by an operator-precedence (Pratt) chain:
//! `or -> xor -> and -> not -> comparison -> string_op -> addition ->
//! multiplication -> power -> unary -> property_access -> primary`.

use std::collections::HashMap;

use crate::cypher::ast::*;
use crate::cypher::lexer::{self, tokenize, Token, TokenKind};
use crate::{Error, Result};

/// Parse a full Cypher text into a `Statement` (a query plus any
/// `UNION`/`UNION ALL` continuations).
pub fn parse(text: &str) -> Result<Statement> {
    let tokens = tokenize(text)?;
    if tokens.len() == 1 {
        return Err(Error::SyntaxError {
            position: 0,
            line: 1,
            column: 1,
            message: "Empty query".into(),
        });
    }
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let first = parser.parse_query()?;
    let mut unions = Vec::new();
    while parser.check(TokenKind::Union) {
        parser.advance();
        let all = if parser.check(TokenKind::All) {
            parser.advance();
            true
        } else {
            false
        };
        let query = parser.parse_query()?;
        unions.push((all, query));
    }
    parser.expect(TokenKind::Eof)?;
    Ok(Statement { first, unions })
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.current().clone();
            Err(Error::SyntaxError {
                position: tok.span.start,
                line: tok.span.line,
                column: tok.span.column,
                message: format!("Expected {kind:?}, found {:?} ({:?})", tok.kind, tok.text),
            })
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let tok = self.current();
        Error::SyntaxError {
            position: tok.span.start,
            line: tok.span.line,
            column: tok.span.column,
            message: message.into(),
        }
    }

    /// Accepts a plain identifier OR any reserved keyword's text — keywords
    /// are reserved in bare-expression position but remain usable as alias
    /// names, property keys, labels and relationship types.
    fn identifier_like(&mut self) -> Result<String> {
        let tok = self.current().clone();
        if tok.kind == TokenKind::Identifier || lexer::is_keyword(tok.kind) {
            self.advance();
            Ok(tok.text)
        } else {
            Err(self.error(format!("Expected identifier, found {:?}", tok.kind)))
        }
    }

    fn plain_identifier(&mut self) -> Result<String> {
        if self.check(TokenKind::Identifier) {
            Ok(self.advance().text.clone())
        } else {
            Err(self.error("Expected identifier"))
        }
    }

    // ------------------------------------------------------------------
    // Query = clause sequence
    // ------------------------------------------------------------------

    fn parse_query(&mut self) -> Result<Query> {
        let mut clauses = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::OptionalMatch | TokenKind::Match => {
                    clauses.push(Clause::Match(self.parse_match_clause()?));
                }
                TokenKind::Create => {
                    clauses.push(Clause::Create(self.parse_create_clause()?));
                }
                TokenKind::Merge => {
                    clauses.push(Clause::Merge(self.parse_merge_clause()?));
                }
                TokenKind::Set => {
                    clauses.push(Clause::Set(self.parse_set_clause()?));
                }
                TokenKind::Remove => {
                    clauses.push(Clause::Remove(self.parse_remove_clause()?));
                }
                TokenKind::Delete | TokenKind::DetachDelete => {
                    clauses.push(Clause::Delete(self.parse_delete_clause()?));
                }
                TokenKind::Return => {
                    clauses.push(Clause::Return(self.parse_return_clause()?));
                }
                TokenKind::With => {
                    clauses.push(Clause::With(self.parse_with_clause()?));
                }
                TokenKind::Unwind => {
                    clauses.push(Clause::Unwind(self.parse_unwind_clause()?));
                }
                TokenKind::Call => {
                    clauses.push(Clause::Call(self.parse_call_clause()?));
                }
                TokenKind::Eof | TokenKind::Union => break,
                _ => return Err(self.error(format!("Expected clause, found {:?}", self.current().kind))),
            }
        }
        if clauses.is_empty() {
            return Err(self.error("Empty query"));
        }
        Ok(Query { clauses })
    }

    // ------------------------------------------------------------------
    // Clauses
    // ------------------------------------------------------------------

    fn parse_match_clause(&mut self) -> Result<MatchClause> {
        let optional = if self.check(TokenKind::OptionalMatch) {
            self.advance();
            true
        } else {
            false
        };
        self.expect(TokenKind::Match)?;
        let patterns = self.parse_pattern_list()?;
        let where_clause = if self.check(TokenKind::Where) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(MatchClause { optional, patterns, where_clause })
    }

    fn parse_create_clause(&mut self) -> Result<CreateClause> {
        self.expect(TokenKind::Create)?;
        let patterns = self.parse_pattern_list()?;
        Ok(CreateClause { patterns })
    }

    fn parse_merge_clause(&mut self) -> Result<MergeClause> {
        self.expect(TokenKind::Merge)?;
        let pattern = self.parse_pattern()?;
        let mut on_create = Vec::new();
        let mut on_match = Vec::new();
        while self.check(TokenKind::On) {
            self.advance();
            if self.check(TokenKind::Create) {
                self.advance();
                self.expect(TokenKind::Set)?;
                on_create.extend(self.parse_set_assignments()?);
            } else if self.check(TokenKind::Match) {
                self.advance();
                self.expect(TokenKind::Set)?;
                on_match.extend(self.parse_set_assignments()?);
            } else {
                return Err(self.error("Expected CREATE or MATCH after ON"));
            }
        }
        Ok(MergeClause { pattern, on_create, on_match })
    }

    fn parse_set_clause(&mut self) -> Result<SetClause> {
        self.expect(TokenKind::Set)?;
        Ok(SetClause { items: self.parse_set_assignments()? })
    }

    fn parse_set_assignments(&mut self) -> Result<Vec<SetItem>> {
        let mut items = Vec::new();
        loop {
            let variable = self.plain_identifier()?;
            if self.check(TokenKind::Colon) {
                self.advance();
                let label = self.identifier_like()?;
                items.push(SetItem::Label { variable, label });
            } else if self.check(TokenKind::Dot) {
                self.advance();
                let key = self.identifier_like()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                items.push(SetItem::Property { variable, key, value });
            } else {
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                items.push(SetItem::AllProperties { variable, value });
            }
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(items)
    }

    fn parse_remove_clause(&mut self) -> Result<RemoveClause> {
        self.expect(TokenKind::Remove)?;
        let mut items = Vec::new();
        loop {
            let variable = self.plain_identifier()?;
            if self.check(TokenKind::Colon) {
                self.advance();
                let label = self.identifier_like()?;
                items.push(RemoveItem::Label { variable, label });
            } else {
                self.expect(TokenKind::Dot)?;
                let key = self.identifier_like()?;
                items.push(RemoveItem::Property { variable, key });
            }
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(RemoveClause { items })
    }

    fn parse_delete_clause(&mut self) -> Result<DeleteClause> {
        let detach = if self.check(TokenKind::DetachDelete) {
            self.advance();
            true
        } else {
            false
        };
        self.expect(TokenKind::Delete)?;
        let variables = self.parse_ident_list()?;
        Ok(DeleteClause { detach, variables })
    }

    fn parse_return_clause(&mut self) -> Result<ReturnClause> {
        self.expect(TokenKind::Return)?;
        let distinct = if self.check(TokenKind::Distinct) {
            self.advance();
            true
        } else {
            false
        };
        let items = self.parse_projections()?;
        let order_by = self.parse_order_by_opt()?;
        let skip = self.parse_skip_opt()?;
        let limit = self.parse_limit_opt()?;
        Ok(ReturnClause { distinct, items, order_by, skip, limit })
    }

    fn parse_with_clause(&mut self) -> Result<WithClause> {
        self.expect(TokenKind::With)?;
        let distinct = if self.check(TokenKind::Distinct) {
            self.advance();
            true
        } else {
            false
        };
        let items = self.parse_projections()?;
        let order_by = self.parse_order_by_opt()?;
        let skip = self.parse_skip_opt()?;
        let limit = self.parse_limit_opt()?;
        let where_clause = if self.check(TokenKind::Where) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(WithClause { distinct, items, order_by, skip, limit, where_clause })
    }

    fn parse_unwind_clause(&mut self) -> Result<UnwindClause> {
        self.expect(TokenKind::Unwind)?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::As)?;
        let alias = self.identifier_like()?;
        Ok(UnwindClause { expr, alias })
    }

    fn parse_call_clause(&mut self) -> Result<CallClause> {
        self.expect(TokenKind::Call)?;
        let mut name = self.identifier_like()?;
        while self.check(TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.identifier_like()?);
        }
        self.expect(TokenKind::LParen)?;
        let args = self.parse_arg_list()?;
        self.expect(TokenKind::RParen)?;
        let mut yield_items = Vec::new();
        let mut where_clause = None;
        if self.check(TokenKind::Yield) {
            self.advance();
            yield_items = self.parse_ident_list()?;
            if self.check(TokenKind::Where) {
                self.advance();
                where_clause = Some(self.parse_expr()?);
            }
        }
        Ok(CallClause { name, args, yield_items, where_clause })
    }

    fn parse_projections(&mut self) -> Result<Vec<ReturnItem>> {
        if self.check(TokenKind::Star) {
            self.advance();
            return Ok(vec![ReturnItem { expr: Expr::Star, alias: None }]);
        }
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let alias = if self.check(TokenKind::As) {
                self.advance();
                Some(self.identifier_like()?)
            } else {
                None
            };
            items.push(ReturnItem { expr, alias });
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(items)
    }

    fn parse_order_by_opt(&mut self) -> Result<Vec<OrderExpr>> {
        if !self.check(TokenKind::Order) {
            return Ok(Vec::new());
        }
        self.advance();
        self.expect(TokenKind::By)?;
        let mut keys = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let ascending = if self.check(TokenKind::Desc) {
                self.advance();
                false
            } else {
                if self.check(TokenKind::Asc) {
                    self.advance();
                }
                true
            };
            keys.push(OrderExpr { expr, ascending });
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(keys)
    }

    fn parse_skip_opt(&mut self) -> Result<Option<Expr>> {
        if self.check(TokenKind::Skip) {
            self.advance();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_limit_opt(&mut self) -> Result<Option<Expr>> {
        if self.check(TokenKind::Limit) {
            self.advance();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.identifier_like()?];
        while self.check(TokenKind::Comma) {
            self.advance();
            names.push(self.identifier_like()?);
        }
        Ok(names)
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(args)
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn parse_pattern_list(&mut self) -> Result<Vec<Pattern>> {
        let mut patterns = vec![self.parse_pattern()?];
        while self.check(TokenKind::Comma) {
            self.advance();
            patterns.push(self.parse_pattern()?);
        }
        Ok(patterns)
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let mut elements = vec![PatternElement::Node(self.parse_node_pattern()?)];
        while self.check(TokenKind::Dash) || self.check(TokenKind::LeftArrow) {
            let rel = self.parse_rel_pattern()?;
            elements.push(PatternElement::Relationship(rel));
            elements.push(PatternElement::Node(self.parse_node_pattern()?));
        }
        Ok(Pattern { elements })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.expect(TokenKind::LParen)?;
        let alias = if self.check(TokenKind::Identifier) {
            Some(self.advance().text.clone())
        } else {
            None
        };
        let mut labels = Vec::new();
        while self.check(TokenKind::Colon) {
            self.advance();
            labels.push(self.identifier_like()?);
        }
        let properties = if self.check(TokenKind::LBrace) {
            self.parse_property_pairs()?.into_iter().collect()
        } else {
            HashMap::new()
        };
        self.expect(TokenKind::RParen)?;
        Ok(NodePattern { alias, labels, properties })
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern> {
        let start_left = if self.check(TokenKind::LeftArrow) {
            self.advance();
            true
        } else {
            self.expect(TokenKind::Dash)?;
            false
        };
        self.expect(TokenKind::LBracket)?;
        let alias = if self.check(TokenKind::Identifier) {
            Some(self.advance().text.clone())
        } else {
            None
        };
        let mut rel_types = Vec::new();
        if self.check(TokenKind::Colon) {
            self.advance();
            rel_types.push(self.identifier_like()?);
            while self.check(TokenKind::Pipe) {
                self.advance();
                if self.check(TokenKind::Colon) {
                    self.advance();
                }
                rel_types.push(self.identifier_like()?);
            }
        }
        let var_length = if self.check(TokenKind::Star) {
            self.advance();
            Some(self.parse_var_length()?)
        } else {
            None
        };
        let properties = if self.check(TokenKind::LBrace) {
            self.parse_property_pairs()?.into_iter().collect()
        } else {
            HashMap::new()
        };
        self.expect(TokenKind::RBracket)?;

        let direction = if self.check(TokenKind::Arrow) {
            self.advance();
            if start_left {
                return Err(self.error("Relationship pattern cannot have arrows on both ends"));
            }
            PatternDirection::Right
        } else {
            self.expect(TokenKind::Dash)?;
            if start_left { PatternDirection::Left } else { PatternDirection::Both }
        };

        Ok(RelPattern { alias, rel_types, direction, properties, var_length })
    }

    fn parse_var_length(&mut self) -> Result<VarLength> {
        if self.check(TokenKind::Integer) {
            let min: usize = self.advance().text.parse().unwrap_or(0);
            if self.check(TokenKind::DotDot) {
                self.advance();
                let max = if self.check(TokenKind::Integer) {
                    Some(self.advance().text.parse().unwrap_or(min))
                } else {
                    None
                };
                Ok(VarLength { min: Some(min), max })
            } else {
                Ok(VarLength { min: Some(min), max: Some(min) })
            }
        } else if self.check(TokenKind::DotDot) {
            self.advance();
            let max = if self.check(TokenKind::Integer) {
                Some(self.advance().text.parse().unwrap_or(0))
            } else {
                None
            };
            Ok(VarLength { min: None, max })
        } else {
            Ok(VarLength { min: None, max: None })
        }
    }

    fn parse_property_pairs(&mut self) -> Result<Vec<(String, Expr)>> {
        self.expect(TokenKind::LBrace)?;
        let mut pairs = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.identifier_like()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expr()?;
                pairs.push((key, value));
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(pairs)
    }

    // ------------------------------------------------------------------
    // Expressions (Pratt chain)
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_xor()?;
        while self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_xor()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Xor) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Xor, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.check(TokenKind::Not) {
            self.advance();
            let inner = self.parse_not()?;
            Ok(Expr::UnaryOp { op: UnaryOp::Not, expr: Box::new(inner) })
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_string_op()?;
        loop {
            match self.current().kind {
                TokenKind::Eq | TokenKind::Neq | TokenKind::Lt | TokenKind::Lte
                | TokenKind::Gt | TokenKind::Gte => {
                    let op = match self.advance().kind {
                        TokenKind::Eq => BinaryOp::Eq,
                        TokenKind::Neq => BinaryOp::Neq,
                        TokenKind::Lt => BinaryOp::Lt,
                        TokenKind::Lte => BinaryOp::Lte,
                        TokenKind::Gt => BinaryOp::Gt,
                        TokenKind::Gte => BinaryOp::Gte,
                        _ => unreachable!(),
                    };
                    let right = self.parse_string_op()?;
                    left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
                }
                TokenKind::Is => {
                    self.advance();
                    let negated = if self.check(TokenKind::Not) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    self.expect(TokenKind::Null)?;
                    left = Expr::IsNull { expr: Box::new(left), negated };
                }
                TokenKind::In => {
                    self.advance();
                    let list = self.parse_string_op()?;
                    left = Expr::In { expr: Box::new(left), list: Box::new(list) };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_string_op(&mut self) -> Result<Expr> {
        let mut left = self.parse_addition()?;
        loop {
            let op = match self.current().kind {
                TokenKind::StartsWith => StringOp::StartsWith,
                TokenKind::EndsWith => StringOp::EndsWith,
                TokenKind::Contains => StringOp::Contains,
                _ => break,
            };
            self.advance();
            let right = self.parse_addition()?;
            left = Expr::StringOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_addition(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplication()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Dash => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplication()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> Result<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let left = self.parse_unary()?;
        if self.check(TokenKind::Caret) {
            self.advance();
            let right = self.parse_power()?; // right-associative
            Ok(Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Pow, right: Box::new(right) })
        } else {
            Ok(left)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(TokenKind::Dash) {
            self.advance();
            let inner = self.parse_unary()?;
            Ok(Expr::UnaryOp { op: UnaryOp::Negate, expr: Box::new(inner) })
        } else {
            self.parse_property_access()
        }
    }

    fn parse_property_access(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(TokenKind::Dot) {
                self.advance();
                let key = self.identifier_like()?;
                expr = Expr::Property { expr: Box::new(expr), key };
            } else if self.check(TokenKind::Colon) {
                self.advance();
                let label = self.identifier_like()?;
                expr = Expr::HasLabel { expr: Box::new(expr), label };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Integer => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(tok.text.parse().map_err(|_| {
                    self.error(format!("Invalid integer literal '{}'", tok.text))
                })?)))
            }
            TokenKind::Float => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(tok.text.parse().map_err(|_| {
                    self.error(format!("Invalid float literal '{}'", tok.text))
                })?)))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(Expr::Literal(Literal::String(tok.text)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Parameter => {
                self.advance();
                Ok(Expr::Parameter(tok.text))
            }
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Star)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => Ok(Expr::MapLiteral(self.parse_property_pairs()?)),
            TokenKind::Case => self.parse_case_expr(),
            TokenKind::Exists => self.parse_exists_expr(),
            TokenKind::Identifier => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    self.advance();
                    let distinct = if self.check(TokenKind::Distinct) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    let args = if self.check(TokenKind::Star) {
                        self.advance();
                        vec![Expr::Star]
                    } else {
                        self.parse_arg_list()?
                    };
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::FunctionCall { name: tok.text, args, distinct })
                } else {
                    Ok(Expr::Variable(tok.text))
                }
            }
            _ => Err(self.error(format!("Expected expression, found {:?}", tok.kind))),
        }
    }

    fn parse_list_literal(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                items.push(self.parse_expr()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::List(items))
    }

    fn parse_case_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Case)?;
        let operand = if !self.check(TokenKind::When) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let mut whens = Vec::new();
        while self.check(TokenKind::When) {
            self.advance();
            let cond = self.parse_expr()?;
            self.expect(TokenKind::Then)?;
            let result = self.parse_expr()?;
            whens.push((cond, result));
        }
        let else_expr = if self.check(TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect(TokenKind::End)?;
        Ok(Expr::Case { operand, whens, else_expr })
    }

    fn parse_exists_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Exists)?;
        self.expect(TokenKind::LParen)?;
        let pattern = self.parse_pattern()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Exists(Box::new(pattern)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Statement {
        parse(text).unwrap_or_else(|e| panic!("parse failed for {text:?}: {e:?}"))
    }

    #[test]
    fn parses_simple_match_return() {
        let stmt = parse_ok("MATCH (n:Person) RETURN n.name, n.age");
        assert_eq!(stmt.first.clauses.len(), 2);
        assert!(matches!(stmt.first.clauses[0], Clause::Match(_)));
        assert!(matches!(stmt.first.clauses[1], Clause::Return(_)));
    }

    #[test]
    fn parses_create_with_properties() {
        let stmt = parse_ok("CREATE (n:Person {name: 'Alice', age: 30})");
        match &stmt.first.clauses[0] {
            Clause::Create(c) => {
                assert_eq!(c.patterns.len(), 1);
                match &c.patterns[0].elements[0] {
                    PatternElement::Node(n) => {
                        assert_eq!(n.labels, vec!["Person"]);
                        assert_eq!(n.properties.len(), 2);
                    }
                    _ => panic!("expected node"),
                }
            }
            _ => panic!("expected create clause"),
        }
    }

    #[test]
    fn parses_relationship_chain() {
        let stmt = parse_ok("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN b");
        match &stmt.first.clauses[0] {
            Clause::Match(m) => {
                assert_eq!(m.patterns[0].elements.len(), 3);
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn rejects_double_arrow() {
        let err = parse("MATCH (a)<-[:KNOWS]->(b) RETURN a").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("arrows on both ends"), "{msg}");
    }

    #[test]
    fn parses_optional_match() {
        let stmt = parse_ok("MATCH (a) OPTIONAL MATCH (a)-[:KNOWS]->(b) RETURN a, b");
        assert!(matches!(&stmt.first.clauses[1], Clause::Match(m) if m.optional));
    }

    #[test]
    fn parses_merge_with_on_create_on_match() {
        let stmt = parse_ok(
            "MERGE (u:User {id: 'u1'}) ON CREATE SET u.created = true ON MATCH SET u.created = false",
        );
        match &stmt.first.clauses[0] {
            Clause::Merge(m) => {
                assert_eq!(m.on_create.len(), 1);
                assert_eq!(m.on_match.len(), 1);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn parses_variable_length_path() {
        let stmt = parse_ok("MATCH (a)-[:NEXT*1..2]->(b) RETURN b");
        match &stmt.first.clauses[0] {
            Clause::Match(m) => match &m.patterns[0].elements[1] {
                PatternElement::Relationship(r) => {
                    let vl = r.var_length.unwrap();
                    assert_eq!(vl.min, Some(1));
                    assert_eq!(vl.max, Some(2));
                }
                _ => panic!("expected relationship"),
            },
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn parses_unwind() {
        let stmt = parse_ok("UNWIND [1,2,3] AS x RETURN sum(x) AS s");
        assert!(matches!(stmt.first.clauses[0], Clause::Unwind(_)));
        match &stmt.first.clauses[1] {
            Clause::Return(r) => assert_eq!(r.items[0].alias.as_deref(), Some("s")),
            _ => panic!("expected return"),
        }
    }

    #[test]
    fn parses_union_all() {
        let stmt = parse_ok(
            "MATCH (n:Person)-[:KNOWS]->(m) RETURN m.name UNION ALL MATCH (n:Person)-[:WORKS_WITH]->(m) RETURN m.name",
        );
        assert_eq!(stmt.unions.len(), 1);
        assert!(stmt.unions[0].0);
    }

    #[test]
    fn parses_call_yield() {
        let stmt = parse_ok("CALL db.labels() YIELD label RETURN label");
        match &stmt.first.clauses[0] {
            Clause::Call(c) => {
                assert_eq!(c.name, "db.labels");
                assert_eq!(c.yield_items, vec!["label"]);
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn parses_list_concat_literal() {
        let stmt = parse_ok("RETURN [1,2] + [3] AS a");
        match &stmt.first.clauses[0] {
            Clause::Return(r) => {
                assert!(matches!(r.items[0].expr, Expr::BinaryOp { op: BinaryOp::Add, .. }));
            }
            _ => panic!("expected return"),
        }
    }

    #[test]
    fn keyword_allowed_as_alias() {
        let stmt = parse_ok("MATCH (n) RETURN n.name AS order");
        match &stmt.first.clauses[1] {
            Clause::Return(r) => assert_eq!(r.items[0].alias.as_deref(), Some("order")),
            _ => panic!("expected return"),
        }
    }

    #[test]
    fn empty_query_is_an_error() {
        let err = parse("").unwrap_err();
        assert!(format!("{err}").contains("Empty query"));
    }
}
