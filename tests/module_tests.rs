//! `require`: search paths, dual-key caching, aggregated failures.

mod common;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::*;
use graft::prelude::*;

struct CountingLoader {
    evaluations: Vec<String>,
}

impl ModuleLoader for CountingLoader {
    fn evaluate(
        &mut self,
        _ctx: &mut MacroContext,
        name: &str,
        _path: &Path,
        text: &str,
    ) -> Result<Value, GraftError> {
        self.evaluations.push(name.to_string());
        Ok(Value::Int(text.len() as i64))
    }
}

struct TempTree {
    root: PathBuf,
}

impl TempTree {
    fn new(label: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "graft-{}-{}",
            label,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("lib")).unwrap();
        Self { root }
    }

    fn write(&self, relative: &str, text: &str) {
        std::fs::write(self.root.join(relative), text).unwrap();
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn module_context(search_paths: Vec<PathBuf>) -> MacroContext {
    MacroContext::with_options(
        Rc::new(RefCell::new(NullAnalyzer)),
        ContextOptions {
            search_paths,
            ..ContextOptions::default()
        },
    )
}

#[test]
fn modules_are_cached_by_logical_name() {
    let tree = TempTree::new("cache-by-name");
    tree.write("lib/util.ct", "return {}");
    let mut ctx = module_context(vec![tree.root.clone()]);
    let mut loader = CountingLoader {
        evaluations: Vec::new(),
    };

    let first = ctx.require("lib.util", &mut loader).unwrap();
    let second = ctx.require("lib.util", &mut loader).unwrap();
    assert_eq!(first, second);
    assert_eq!(loader.evaluations, vec!["lib.util"]);
}

#[test]
fn one_physical_file_under_two_names_evaluates_once() {
    let tree = TempTree::new("dual-name");
    tree.write("lib/util.ct", "return {}");
    // Both the root and lib/ are on the search path, so the same file
    // resolves as `lib.util` and as `util`.
    let mut ctx = module_context(vec![tree.root.clone(), tree.root.join("lib")]);
    let mut loader = CountingLoader {
        evaluations: Vec::new(),
    };

    let by_qualified = ctx.require("lib.util", &mut loader).unwrap();
    let by_short = ctx.require("util", &mut loader).unwrap();
    assert_eq!(by_qualified, by_short);
    assert_eq!(loader.evaluations, vec!["lib.util"]);
}

#[test]
fn missing_module_aggregates_every_attempted_path() {
    let tree = TempTree::new("missing");
    let other = tree.root.join("lib");
    let mut ctx = module_context(vec![tree.root.clone(), other.clone()]);
    let mut loader = CountingLoader {
        evaluations: Vec::new(),
    };

    let err = ctx.require("nowhere", &mut loader).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Module);
    let message = err.kind.to_string();
    assert!(message.contains(&tree.root.join("nowhere.ct").display().to_string()));
    assert!(message.contains(&other.join("nowhere.ct").display().to_string()));
    assert!(loader.evaluations.is_empty());
}

#[test]
fn module_text_is_registered_as_a_script_for_error_translation() {
    let tree = TempTree::new("script-reg");
    let mut ctx = module_context(vec![tree.root.clone()]);

    // The module embeds an origin marker for a node of a registered source.
    ctx.register_source("main.src", "one\ntwo\nthree\n");
    let origin = Node::literal(Scalar::Int(1), Some(Span::new("main.src", 4, 7)));
    let marker = ctx.origin_marker(&origin);
    tree.write(
        "lib/gen.ct",
        &format!("-- prologue\n{}\nstep()\n", marker),
    );

    let mut loader = CountingLoader {
        evaluations: Vec::new(),
    };
    ctx.require("lib.gen", &mut loader).unwrap();

    // An error citing the module's script line lands on the user's line.
    let translated = ctx.translate_error("lib.gen:3: oops");
    assert_eq!(translated, "main.src:2: oops");
}
