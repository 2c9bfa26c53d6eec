//! Search orchestration.
//!
//! Runs the per-file pipeline over a discovered file set: read, parse,
//! convert, evaluate, resolve. Unreadable or unparseable files are skipped
//! (with a warning in verbose mode); query and configuration errors abort
//! the run before any file is processed. Hits are collected in file order
//! with duplicates preserved.

use std::path::Path;

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::adapter::AdapterRegistry;
use crate::document::TreeBuilder;
use crate::query::{LineResolver, Match, QueryBackend};
use crate::ui;
use crate::walk;
use crate::{Error, Result};

/// Options controlling one search run
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Render matches to stdout as they are found
    pub print_matches: bool,
    /// Render each matched element as XML instead of a source line
    pub print_xml: bool,
    /// Report skipped files
    pub verbose: bool,
    /// Display absolute paths
    pub abspaths: bool,
    /// Recurse into subdirectories
    pub recurse: bool,
    /// Context lines before each match
    pub before_context: usize,
    /// Context lines after each match
    pub after_context: usize,
    /// Symmetric context; overrides before/after when set
    pub context: usize,
    /// Print the raw source line next to each match
    pub show_source: bool,
    /// Drop leading docstrings while building documents
    pub omit_docstrings: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            print_matches: true,
            print_xml: false,
            verbose: false,
            abspaths: false,
            recurse: true,
            before_context: 0,
            after_context: 0,
            context: 0,
            show_source: true,
            omit_docstrings: false,
        }
    }
}

impl SearchOptions {
    fn wants_context(&self) -> bool {
        self.before_context > 0 || self.after_context > 0 || self.context > 0
    }
}

/// One resolved match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub line: u32,
}

/// Runs the conversion + query + resolution pipeline across a file set
pub struct SearchCoordinator<'a> {
    registry: &'a AdapterRegistry,
    backend: &'a dyn QueryBackend,
    options: SearchOptions,
}

impl<'a> SearchCoordinator<'a> {
    pub fn new(
        registry: &'a AdapterRegistry,
        backend: &'a dyn QueryBackend,
        options: SearchOptions,
    ) -> Self {
        Self {
            registry,
            backend,
            options,
        }
    }

    /// Search every eligible file under `root` for `expression`.
    ///
    /// Returns the ordered (path, line) hits; duplicates are preserved so a
    /// line matched by two sub-expressions is reported twice.
    pub fn run(&self, root: &Path, expression: &str) -> Result<Vec<SearchHit>> {
        if self.options.wants_context() && !self.options.print_matches {
            return Err(Error::Config(
                "context cannot be shown when match output is suppressed".into(),
            ));
        }
        // syntax and capability problems surface before any file is touched
        self.backend.check(expression)?;

        let extensions = self.registry.extensions();
        let files = walk::discover_files(root, self.options.recurse, &extensions)?;
        let record_mapping = !self.backend.supports_ancestor_axis();

        let mut hits = Vec::new();
        for path in files {
            let Some(adapter) = self.registry.find_adapter(&path) else {
                continue;
            };
            let display = self.display_path(&path);

            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    self.warn_skip(&display, &err.to_string());
                    continue;
                }
            };
            let tree = match adapter.parse(&source) {
                Ok(tree) => tree,
                Err(err) => {
                    self.warn_skip(&display, &err.to_string());
                    continue;
                }
            };

            let (doc, mapping) =
                TreeBuilder::new(&tree, self.options.omit_docstrings, record_mapping).build();
            let matches = self.backend.evaluate(&doc, expression)?;
            if matches.is_empty() {
                continue;
            }

            if self.options.print_matches && self.options.print_xml {
                for m in &matches {
                    match m {
                        Match::Element(element) => print!("{}", doc.xml_string(*element)),
                        Match::Slot { name, .. } => println!("<{}>", name),
                        Match::Leaf { text, .. } => println!("{}", text),
                        Match::Attr { value, .. } => println!("{}", value),
                        Match::Value(value) => println!("{}", value),
                    }
                }
            }

            let mut resolver = LineResolver::new(&doc, self.backend);
            if let Some(mapping) = &mapping {
                resolver = resolver.with_mapping(mapping, &tree);
            }
            let lines = resolver.lines(&matches)?;

            let file_lines: Vec<&str> = source.lines().collect();
            for line in lines {
                if self.options.print_matches && !self.options.print_xml {
                    self.print_match(&display, &file_lines, line);
                }
                hits.push(SearchHit {
                    path: display.clone(),
                    line,
                });
            }
        }
        Ok(hits)
    }

    fn display_path(&self, path: &Path) -> String {
        if self.options.abspaths {
            std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.to_path_buf())
                .display()
                .to_string()
        } else {
            path.display().to_string()
        }
    }

    fn warn_skip(&self, path: &str, reason: &str) {
        tracing::debug!("skipping {}: {}", path, reason);
        if self.options.verbose {
            ui::warn(&format!("Unable to parse or read {}", path));
        }
    }

    fn print_match(&self, path: &str, file_lines: &[&str], line: u32) {
        let theme = ui::theme();
        if !self.options.show_source {
            println!(
                "{}:{}",
                path.style(theme.path.clone()),
                line.style(theme.lineno.clone())
            );
            return;
        }
        let index = (line as usize).saturating_sub(1);
        let window = context_window(
            file_lines,
            index,
            self.options.before_context,
            self.options.after_context,
            self.options.context,
        );
        for (idx, text) in window {
            let matched = idx == index;
            let sep = if matched { '>' } else { ' ' };
            let lineno = format!("{:<5}", idx + 1);
            let text = if matched {
                text.style(theme.matched.clone()).to_string()
            } else {
                text.style(theme.context.clone()).to_string()
            };
            println!(
                "{}:{}{}\t{}",
                path.style(theme.path.clone()),
                lineno.style(theme.lineno.clone()),
                sep,
                text
            );
        }
        if self.options.wants_context() {
            println!();
        }
    }
}

/// Window of (index, line) pairs around `index`, like grep -A/-B/-C.
///
/// `before` and `after` are ignored when `both` is set. The window is
/// clipped to the valid index range; an out-of-range index yields nothing.
pub fn context_window<'l>(
    lines: &[&'l str],
    index: usize,
    before: usize,
    after: usize,
    both: usize,
) -> Vec<(usize, &'l str)> {
    let (before, after) = if both > 0 { (both, both) } else { (before, after) };
    if index >= lines.len() {
        return Vec::new();
    }
    let start = index.saturating_sub(before);
    let end = (index + after).min(lines.len() - 1);
    (start..=end).map(|i| (i, lines[i])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter;
    use crate::query::{FullBackend, RestrictedBackend};
    use std::fs;

    const LINES: [&str; 10] = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];

    #[test]
    fn test_context_window() {
        let window = context_window(&LINES, 5, 1, 2, 0);
        assert_eq!(window, vec![(4, "e"), (5, "f"), (6, "g"), (7, "h")]);
    }

    #[test]
    fn test_context_window_both_overrides() {
        let window = context_window(&LINES, 5, 1, 2, 1);
        assert_eq!(window, vec![(4, "e"), (5, "f"), (6, "g")]);
    }

    #[test]
    fn test_context_window_clipping() {
        let at_start = context_window(&LINES, 0, 3, 0, 0);
        assert_eq!(at_start, vec![(0, "a")]);

        let at_end = context_window(&LINES, 9, 0, 5, 0);
        assert_eq!(at_end, vec![(9, "j")]);

        assert!(context_window(&LINES, 10, 1, 1, 0).is_empty());
    }

    fn quiet_options() -> SearchOptions {
        SearchOptions {
            print_matches: false,
            ..SearchOptions::default()
        }
    }

    #[test]
    fn test_search_skips_unparseable_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.py"), "def foo():\n    pass\n").unwrap();
        fs::write(dir.path().join("bad.py"), "def broken(:\n").unwrap();
        fs::write(dir.path().join("other.py"), "def bar():\n    pass\n").unwrap();

        let registry = adapter::default_registry();
        let backend = FullBackend::new();
        let coordinator = SearchCoordinator::new(&registry, &backend, quiet_options());

        let hits = coordinator
            .run(dir.path(), "//function_definition")
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.line == 1));
        assert!(hits[0].path.ends_with("good.py"));
        assert!(hits[1].path.ends_with("other.py"));
    }

    #[test]
    fn test_multiplicity_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.py"), "def foo():\n    pass\n").unwrap();

        let registry = adapter::default_registry();
        let backend = FullBackend::new();
        let coordinator = SearchCoordinator::new(&registry, &backend, quiet_options());

        let hits = coordinator
            .run(
                dir.path(),
                "//function_definition | //function_definition/name/identifier",
            )
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], hits[1]);
    }

    #[test]
    fn test_backends_find_the_same_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("mod.py"),
            "class A:\n    def m(self):\n        pass\n\ndef f():\n    pass\n",
        )
        .unwrap();

        let registry = adapter::default_registry();
        let full = FullBackend::new();
        let restricted = RestrictedBackend::new();
        let expression = "//function_definition";

        let full_hits = SearchCoordinator::new(&registry, &full, quiet_options())
            .run(dir.path(), expression)
            .unwrap();
        let restricted_hits = SearchCoordinator::new(&registry, &restricted, quiet_options())
            .run(dir.path(), expression)
            .unwrap();
        assert_eq!(full_hits, restricted_hits);
        assert_eq!(full_hits.len(), 2);
    }

    #[test]
    fn test_context_with_suppressed_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "pass\n").unwrap();

        let registry = adapter::default_registry();
        let backend = FullBackend::new();
        let options = SearchOptions {
            print_matches: false,
            context: 2,
            ..SearchOptions::default()
        };
        let coordinator = SearchCoordinator::new(&registry, &backend, options);

        let err = coordinator.run(dir.path(), "//module").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_capability_error_aborts_before_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "pass\n").unwrap();

        let registry = adapter::default_registry();
        let backend = RestrictedBackend::new();
        let coordinator = SearchCoordinator::new(&registry, &backend, quiet_options());

        let err = coordinator
            .run(dir.path(), "//pass_statement/ancestor-or-self::*")
            .unwrap_err();
        assert!(matches!(err, Error::Capability { .. }));
    }

    #[test]
    fn test_docstring_elision_changes_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("doc.py"),
            "def f():\n    \"docstring\"\n",
        )
        .unwrap();

        let registry = adapter::default_registry();
        let backend = FullBackend::new();
        let expression = "//function_definition/body/expression_statement";

        let kept = SearchCoordinator::new(&registry, &backend, quiet_options())
            .run(dir.path(), expression)
            .unwrap();
        assert_eq!(kept.len(), 1);

        let options = SearchOptions {
            print_matches: false,
            omit_docstrings: true,
            ..SearchOptions::default()
        };
        let elided = SearchCoordinator::new(&registry, &backend, options)
            .run(dir.path(), expression)
            .unwrap();
        assert!(elided.is_empty());
    }
}
