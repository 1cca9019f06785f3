//! Semantic builder: walks classified token streams and produces elements.
//!
//! Building is two-pass. The first pass records each statement's shape with
//! its coordinates still unresolved and fills the name table, scoped by
//! group. The second pass (in [`Builder::finish`]) resolves named references
//! and relative offsets, so a statement may reference a point defined later
//! in the same scope. A statement either contributes its elements whole or
//! contributes nothing and leaves one diagnostic.

use std::collections::{HashMap, HashSet};

use crate::classify::{component_kind, StatementKind};
use crate::coord::Coord;
use crate::document::{round3, Element, PathLabel, Point, Scale};
use crate::error::{BuildError, Diagnostic, DiagnosticKind};
use crate::option_set::{normalize_label, OptionSet};
use crate::token::{Keyword, PathOp, Token, TokenKind};

pub(crate) struct Builder {
    scopes: Vec<Scope>,
    active: Vec<usize>,
    events: Vec<Event>,
    diagnostics: Vec<Diagnostic>,
}

struct Scope {
    parent: Option<usize>,
    names: HashMap<String, NamedPoint>,
    opened_at: (usize, usize),
}

#[derive(Clone)]
struct NamedPoint {
    coord: Coord,
    scope: usize,
}

enum Event {
    Open { name: Option<String> },
    Close,
    Elem(Pending),
}

struct Pending {
    statement_index: usize,
    offset: usize,
    scope: usize,
    shape: Shape,
}

enum Shape {
    Node {
        name: Option<String>,
        at: Coord,
        options: OptionSet,
        label: Option<String>,
    },
    Wire {
        points: Vec<Coord>,
        directions: Vec<PathOp>,
        options: OptionSet,
        labels: Vec<(usize, String, OptionSet)>,
    },
    Component {
        kind: &'static str,
        name: Option<String>,
        terminals: Vec<Coord>,
        rotation: Option<f64>,
        scale: Option<Scale>,
        options: OptionSet,
        label: Option<String>,
    },
}

/// The `mirror` / `invert` flags a path device may carry instead of
/// explicit scale options.
fn mirror_scale(options: &mut OptionSet) -> Option<Scale> {
    let mirror = options.remove("mirror").is_some();
    let invert = options.remove("invert").is_some();
    match (mirror, invert) {
        (true, true) => Some(Scale { x: -1.0, y: -1.0 }),
        (true, false) => Some(Scale { x: -1.0, y: 1.0 }),
        (false, true) => Some(Scale { x: 1.0, y: -1.0 }),
        (false, false) => None,
    }
}

impl Builder {
    pub(crate) fn new() -> Self {
        Builder {
            scopes: vec![Scope {
                parent: None,
                names: HashMap::new(),
                opened_at: (0, 0),
            }],
            active: vec![0],
            events: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Applies one classified statement. Failures become diagnostics; the
    /// builder stays usable for the next statement.
    pub(crate) fn apply(
        &mut self,
        statement_index: usize,
        offset: usize,
        kind: StatementKind,
        tokens: &[Token],
    ) {
        let result = match kind {
            StatementKind::GroupOpen => self.open_group(statement_index, offset, tokens),
            StatementKind::GroupClose => self.close_group(),
            StatementKind::StandaloneNode => self.build_node(statement_index, offset, tokens),
            StatementKind::SimpleWire | StatementKind::MultiSegmentPath => {
                self.build_wire(statement_index, offset, tokens)
            }
            StatementKind::ComponentOnPath => self.build_component(statement_index, offset, tokens),
            StatementKind::Unrecognized => Err(BuildError::UnrecognizedStatement),
        };
        if let Err(err) = result {
            self.diagnostics.push(Diagnostic {
                statement_index,
                offset,
                kind: err.diagnostic_kind(),
                message: err.to_string(),
            });
        }
    }

    /// Force-closes any open scopes, resolves all deferred references and
    /// returns the element tree with the accumulated diagnostics.
    pub(crate) fn finish(mut self) -> (Vec<Element>, Vec<Diagnostic>) {
        while self.active.len() > 1 {
            let id = self.active.pop().unwrap_or(0);
            let (statement_index, offset) = self.scopes[id].opened_at;
            self.diagnostics.push(Diagnostic {
                statement_index,
                offset,
                kind: DiagnosticKind::Structural,
                message: BuildError::UnclosedGroup.to_string(),
            });
            self.events.push(Event::Close);
        }
        let mut stack: Vec<(Option<String>, Vec<Element>)> = vec![(None, Vec::new())];
        let events = std::mem::take(&mut self.events);
        for event in events {
            match event {
                Event::Open { name } => stack.push((name, Vec::new())),
                Event::Close => {
                    if let Some((name, elements)) = stack.pop() {
                        if let Some((_, parent)) = stack.last_mut() {
                            parent.push(Element::Group {
                                id: String::new(),
                                name,
                                elements,
                            });
                        }
                    }
                }
                Event::Elem(pending) => {
                    let statement_index = pending.statement_index;
                    let offset = pending.offset;
                    match self.resolve(pending) {
                        Ok(element) => {
                            if let Some((_, top)) = stack.last_mut() {
                                top.push(element);
                            }
                        }
                        Err(err) => self.diagnostics.push(Diagnostic {
                            statement_index,
                            offset,
                            kind: err.diagnostic_kind(),
                            message: err.to_string(),
                        }),
                    }
                }
            }
        }
        let (_, root) = stack.swap_remove(0);
        (root, self.diagnostics)
    }

    fn current_scope(&self) -> usize {
        self.active.last().copied().unwrap_or(0)
    }

    fn register_name(&mut self, name: String, coord: Coord) {
        let scope = self.current_scope();
        self.scopes[scope].names.insert(name, NamedPoint { coord, scope });
    }

    fn open_group(
        &mut self,
        statement_index: usize,
        offset: usize,
        tokens: &[Token],
    ) -> Result<(), BuildError> {
        let mut options = OptionSet::default();
        for token in tokens {
            if token.kind == TokenKind::OptionBlock {
                options.merge(OptionSet::parse(token.lexeme));
            }
        }
        let name = options.take_str("name");
        let parent = self.current_scope();
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(parent),
            names: HashMap::new(),
            opened_at: (statement_index, offset),
        });
        self.active.push(id);
        self.events.push(Event::Open { name });
        Ok(())
    }

    fn close_group(&mut self) -> Result<(), BuildError> {
        if self.active.len() <= 1 {
            return Err(BuildError::UnmatchedGroupClose);
        }
        self.active.pop();
        self.events.push(Event::Close);
        Ok(())
    }

    fn build_node(
        &mut self,
        statement_index: usize,
        offset: usize,
        tokens: &[Token],
    ) -> Result<(), BuildError> {
        let is_coordinate = matches!(
            tokens.first().map(|t| t.kind),
            Some(TokenKind::Keyword(Keyword::Coordinate))
        );
        let has_at = tokens
            .iter()
            .any(|t| t.kind == TokenKind::Keyword(Keyword::At));
        let mut seen_at = false;
        let mut options = OptionSet::default();
        let mut name = None;
        let mut position = None;
        let mut label = None;
        for token in tokens {
            match token.kind {
                TokenKind::Keyword(Keyword::At) => seen_at = true,
                TokenKind::OptionBlock => options.merge(OptionSet::parse(token.lexeme)),
                TokenKind::Text => {
                    let text = normalize_label(text_body(token.lexeme));
                    let text = text.trim();
                    if !text.is_empty() {
                        label = Some(text.to_owned());
                    }
                }
                TokenKind::Coordinate => {
                    let coord = Coord::parse(token.lexeme)?;
                    if has_at && !seen_at {
                        if name.is_none() {
                            if let Coord::Named { name: n, .. } = coord {
                                name = Some(n);
                            }
                        }
                    } else if position.is_none() {
                        match coord {
                            Coord::Named { name: n, .. } if !has_at && name.is_none() => {
                                name = Some(n)
                            }
                            coord => position = Some(coord),
                        }
                    }
                }
                _ => {}
            }
        }
        let at = position.ok_or(BuildError::MissingCoordinate)?;
        if is_coordinate && name.is_none() {
            return Err(BuildError::MissingName);
        }
        if let Some(n) = &name {
            self.register_name(n.clone(), at.clone());
        }
        if is_coordinate {
            // A \coordinate only feeds the name table.
            return Ok(());
        }
        let shape = match options.first_key().and_then(component_kind) {
            Some(kind) => {
                options.remove_first();
                let (rotation, scale) = options.take_transform();
                let scale = scale.or_else(|| mirror_scale(&mut options));
                let label = options.take_label().or(label);
                Shape::Component {
                    kind,
                    name,
                    terminals: vec![at],
                    rotation,
                    scale,
                    options,
                    label,
                }
            }
            None => Shape::Node {
                name,
                at,
                options,
                label,
            },
        };
        self.events.push(Event::Elem(Pending {
            statement_index,
            offset,
            scope: self.current_scope(),
            shape,
        }));
        Ok(())
    }

    fn build_wire(
        &mut self,
        statement_index: usize,
        offset: usize,
        tokens: &[Token],
    ) -> Result<(), BuildError> {
        let mut options = OptionSet::default();
        let mut points: Vec<Coord> = Vec::new();
        let mut directions = Vec::new();
        let mut labels: Vec<(usize, String, OptionSet)> = Vec::new();
        let mut inline: Option<OptionSet> = None;
        for token in tokens {
            match token.kind {
                TokenKind::Keyword(Keyword::InlineNode) => inline = Some(OptionSet::default()),
                TokenKind::OptionBlock => {
                    let parsed = OptionSet::parse(token.lexeme);
                    match inline.as_mut() {
                        Some(pending) => pending.merge(parsed),
                        None => options.merge(parsed),
                    }
                }
                TokenKind::Text => {
                    let text = normalize_label(text_body(token.lexeme));
                    let text = text.trim();
                    let options = inline.take().unwrap_or_default();
                    if !text.is_empty() || !options.is_empty() {
                        let at = points.len().saturating_sub(1);
                        labels.push((at, text.to_owned(), options));
                    }
                }
                TokenKind::Coordinate => {
                    points.push(Coord::parse(token.lexeme)?);
                    inline = None;
                }
                TokenKind::PathOp(op) => directions.push(op),
                _ => {}
            }
        }
        if points.len() < 2 {
            return Err(BuildError::ShortPath);
        }
        self.events.push(Event::Elem(Pending {
            statement_index,
            offset,
            scope: self.current_scope(),
            shape: Shape::Wire {
                points,
                directions,
                options,
                labels,
            },
        }));
        Ok(())
    }

    fn build_component(
        &mut self,
        statement_index: usize,
        offset: usize,
        tokens: &[Token],
    ) -> Result<(), BuildError> {
        let mut terminals = Vec::new();
        let mut draw_options = OptionSet::default();
        let mut component_options: Option<OptionSet> = None;
        let mut after_to = false;
        let mut inline_label = None;
        for token in tokens {
            match token.kind {
                TokenKind::Coordinate => {
                    // The editor only ever emits two terminals; extras are
                    // out of dialect and ignored.
                    if terminals.len() < 2 {
                        terminals.push(Coord::parse(token.lexeme)?);
                    }
                    after_to = false;
                }
                TokenKind::PathOp(PathOp::To) => after_to = true,
                TokenKind::OptionBlock => {
                    if after_to && component_options.is_none() {
                        component_options = Some(OptionSet::parse(token.lexeme));
                    } else {
                        draw_options.merge(OptionSet::parse(token.lexeme));
                    }
                    after_to = false;
                }
                TokenKind::Text => {
                    let text = normalize_label(text_body(token.lexeme));
                    let text = text.trim();
                    if !text.is_empty() {
                        inline_label = Some(text.to_owned());
                    }
                }
                _ => {}
            }
        }
        let mut options = component_options.ok_or(BuildError::UnrecognizedStatement)?;
        let kind = options
            .first_key()
            .and_then(component_kind)
            .ok_or(BuildError::UnrecognizedStatement)?;
        options.remove_first();
        let name = options.take_str("name");
        let (rotation, scale) = options.take_transform();
        let scale = scale.or_else(|| mirror_scale(&mut options));
        let label = options.take_label().or(inline_label);
        // Draw-level options fill in underneath; the component block wins
        // on conflicts.
        let mut merged = draw_options;
        merged.merge(options);
        let options = merged;
        if terminals.len() < 2 {
            return Err(BuildError::ShortPath);
        }
        if let Some(n) = &name {
            self.register_name(n.clone(), terminals[0].clone());
        }
        self.events.push(Event::Elem(Pending {
            statement_index,
            offset,
            scope: self.current_scope(),
            shape: Shape::Component {
                kind,
                name,
                terminals,
                rotation,
                scale,
                options,
                label,
            },
        }));
        Ok(())
    }

    fn resolve(&self, pending: Pending) -> Result<Element, BuildError> {
        let scope = pending.scope;
        match pending.shape {
            Shape::Node {
                name,
                at,
                options,
                label,
            } => {
                let position = self.resolve_coord(&at, scope, None)?;
                Ok(Element::Node {
                    id: String::new(),
                    name,
                    position,
                    options,
                    label,
                })
            }
            Shape::Wire {
                points,
                directions,
                options,
                labels,
            } => {
                let points = self.resolve_path(&points, scope)?;
                let labels = labels
                    .into_iter()
                    .map(|(at, text, options)| PathLabel { at, text, options })
                    .collect();
                Ok(Element::Wire {
                    id: String::new(),
                    points,
                    directions,
                    options,
                    labels,
                })
            }
            Shape::Component {
                kind,
                name,
                terminals,
                rotation,
                scale,
                options,
                label,
            } => {
                let terminals = self.resolve_path(&terminals, scope)?;
                let rotation = match rotation {
                    Some(r) => Some(r),
                    None if terminals.len() == 2 => {
                        let (a, b) = (terminals[0], terminals[1]);
                        Some(round3((b.y - a.y).atan2(b.x - a.x).to_degrees()))
                    }
                    None => None,
                };
                Ok(Element::Component {
                    id: String::new(),
                    kind: kind.to_owned(),
                    name,
                    terminals,
                    rotation,
                    scale,
                    options,
                    label,
                })
            }
        }
    }

    /// Resolves a coordinate list with current-point tracking. The current
    /// point starts empty at every statement.
    fn resolve_path(&self, coords: &[Coord], scope: usize) -> Result<Vec<Point>, BuildError> {
        let mut resolved = Vec::with_capacity(coords.len());
        let mut current = None;
        for coord in coords {
            let point = self.resolve_coord(coord, scope, current)?;
            current = Some(point);
            resolved.push(point);
        }
        Ok(resolved)
    }

    fn resolve_coord(
        &self,
        coord: &Coord,
        scope: usize,
        current: Option<Point>,
    ) -> Result<Point, BuildError> {
        match coord {
            Coord::Absolute { x, y } => Ok(Point::rounded(*x, *y)),
            Coord::Relative { dx, dy } => {
                let base = current.ok_or(BuildError::RelativeWithoutAnchor)?;
                Ok(Point::rounded(base.x + dx, base.y + dy))
            }
            Coord::Named { name, .. } => {
                let mut visited = HashSet::new();
                self.resolve_named(name, scope, &mut visited)
            }
        }
    }

    /// Looks a name up through the scope chain. A named point may itself be
    /// defined by another name; the visited set breaks definition cycles.
    fn resolve_named(
        &self,
        name: &str,
        scope: usize,
        visited: &mut HashSet<(usize, String)>,
    ) -> Result<Point, BuildError> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(point) = self.scopes[id].names.get(name) {
                if !visited.insert((id, name.to_owned())) {
                    return Err(BuildError::CircularReference(name.to_owned()));
                }
                return match &point.coord {
                    Coord::Absolute { x, y } => Ok(Point::rounded(*x, *y)),
                    Coord::Relative { .. } => Err(BuildError::UnresolvedReference(name.to_owned())),
                    Coord::Named { name: target, .. } => {
                        self.resolve_named(target, point.scope, visited)
                    }
                };
            }
            cursor = self.scopes[id].parent;
        }
        Err(BuildError::UnresolvedReference(name.to_owned()))
    }
}

fn text_body(lexeme: &str) -> &str {
    let trimmed = lexeme.trim();
    trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::token::tokenize;

    fn run(statements: &[&str]) -> (Vec<Element>, Vec<Diagnostic>) {
        let mut builder = Builder::new();
        for (index, statement) in statements.iter().enumerate() {
            let tokens = tokenize(statement).unwrap();
            builder.apply(index, 0, classify(&tokens), &tokens);
        }
        builder.finish()
    }

    #[test]
    fn relative_chain_accumulates() {
        let (elements, diagnostics) = run(&["\\draw (1,1) -- +(1,0) -- +(0,1);"]);
        assert!(diagnostics.is_empty());
        let Element::Wire { points, .. } = &elements[0] else {
            panic!("expected a wire");
        };
        assert_eq!(
            points,
            &vec![
                Point { x: 1.0, y: 1.0 },
                Point { x: 2.0, y: 1.0 },
                Point { x: 2.0, y: 2.0 }
            ]
        );
    }

    #[test]
    fn forward_reference_resolves_in_second_pass() {
        let (elements, diagnostics) = run(&[
            "\\draw (A) -- (2,0);",
            "\\node (A) at (0,1) {};",
        ]);
        assert!(diagnostics.is_empty());
        let Element::Wire { points, .. } = &elements[0] else {
            panic!("expected a wire");
        };
        assert_eq!(points[0], Point { x: 0.0, y: 1.0 });
    }

    #[test]
    fn coordinate_statement_feeds_the_name_table_only() {
        let (elements, diagnostics) = run(&[
            "\\coordinate (P) at (1,2);",
            "\\draw (P) -- (0,0);",
        ]);
        assert!(diagnostics.is_empty());
        assert_eq!(elements.len(), 1);
        let Element::Wire { points, .. } = &elements[0] else {
            panic!("expected a wire");
        };
        assert_eq!(points[0], Point { x: 1.0, y: 2.0 });
    }

    #[test]
    fn name_defined_in_enclosing_scope_is_visible_inside() {
        let (elements, diagnostics) = run(&[
            "\\node (A) at (0,0) {};",
            "\\begin{scope}",
            "\\draw (A) -- (1,1);",
            "\\end{scope}",
        ]);
        assert!(diagnostics.is_empty());
        let Element::Group { elements: inner, .. } = &elements[1] else {
            panic!("expected a group");
        };
        let Element::Wire { points, .. } = &inner[0] else {
            panic!("expected a wire");
        };
        assert_eq!(points[0], Point { x: 0.0, y: 0.0 });
    }

    #[test]
    fn name_does_not_escape_its_scope() {
        let (elements, diagnostics) = run(&[
            "\\begin{scope}",
            "\\node (A) at (0,0) {};",
            "\\end{scope}",
            "\\draw (A) -- (1,1);",
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnresolvedReference);
        // Only the group survives; the wire was dropped.
        assert_eq!(elements.len(), 1);
        assert!(matches!(elements[0], Element::Group { .. }));
    }

    #[test]
    fn unmatched_close_is_structural_and_non_fatal() {
        let (elements, diagnostics) = run(&[
            "\\end{scope}",
            "\\draw (0,0) -- (1,0);",
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Structural);
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn unclosed_scope_is_force_closed() {
        let (elements, diagnostics) = run(&[
            "\\begin{scope}[name=half]",
            "\\draw (0,0) -- (1,0);",
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Structural);
        let Element::Group { name, elements: inner, .. } = &elements[0] else {
            panic!("expected a group");
        };
        assert_eq!(name.as_deref(), Some("half"));
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn inline_node_attaches_to_preceding_point() {
        let (elements, diagnostics) =
            run(&["\\draw (0,0) -- node[above] {$v$} (2,0);"]);
        assert!(diagnostics.is_empty());
        let Element::Wire { points, labels, .. } = &elements[0] else {
            panic!("expected a wire");
        };
        assert_eq!(points.len(), 2);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].at, 0);
        assert_eq!(labels[0].text, "$v$");
        assert!(labels[0].options.contains("above"));
    }

    #[test]
    fn relative_start_is_an_error_for_that_statement_only() {
        let (elements, diagnostics) = run(&[
            "\\draw +(1,0) -- (2,0);",
            "\\draw (0,0) -- (1,0);",
        ]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn component_block_options_win_over_draw_options() {
        let (elements, diagnostics) =
            run(&["\\draw[color=red] (0,0) to[R, color=blue] (2,0);"]);
        assert!(diagnostics.is_empty());
        let Element::Component { options, .. } = &elements[0] else {
            panic!("expected a component");
        };
        assert_eq!(options.str_value("color"), Some("blue"));
    }

    #[test]
    fn lone_negative_xscale_flips_a_device() {
        let (elements, diagnostics) = run(&["\\node[npn, xscale=-1] (Q1) at (1,1) {};"]);
        assert!(diagnostics.is_empty());
        let Element::Component { rotation, scale, .. } = &elements[0] else {
            panic!("expected a component");
        };
        assert_eq!(*rotation, Some(-180.0));
        assert_eq!(*scale, Some(Scale { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn mirror_flag_becomes_a_scale() {
        let (elements, diagnostics) = run(&["\\draw (0,0) to[D, mirror] (2,0);"]);
        assert!(diagnostics.is_empty());
        let Element::Component { scale, options, .. } = &elements[0] else {
            panic!("expected a component");
        };
        assert_eq!(*scale, Some(Scale { x: -1.0, y: 1.0 }));
        assert!(!options.contains("mirror"));
    }

    #[test]
    fn device_node_becomes_a_component() {
        let (elements, diagnostics) =
            run(&["\\node[npn, rotate=-45] (N1) at (10.75, 7.98) {};"]);
        assert!(diagnostics.is_empty());
        let Element::Component {
            kind,
            name,
            terminals,
            rotation,
            ..
        } = &elements[0]
        else {
            panic!("expected a component");
        };
        assert_eq!(kind, "npn");
        assert_eq!(name.as_deref(), Some("N1"));
        assert_eq!(terminals.len(), 1);
        assert_eq!(*rotation, Some(-45.0));
    }
}
