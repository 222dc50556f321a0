// tests/recipe_parse.rs

//! End-to-end tests: recipe source text through the lexer and parser into
//! the metadata store, and out to the persistent backend.

use braise::{
    Backend, FuncKind, MetadataStore, ParseOutcome, ParseReport, parse_source,
};

fn parse(text: &str) -> (MetadataStore, ParseReport) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let mut store = MetadataStore::new();
    let report = parse_source(text, "test.recipe", &mut store).unwrap();
    (store, report)
}

fn parse_ok(text: &str) -> MetadataStore {
    let (store, report) = parse(text);
    assert_eq!(report.outcome, ParseOutcome::Accepted);
    assert!(
        report.syntax_errors.is_empty(),
        "unexpected syntax errors: {:?}",
        report.syntax_errors
    );
    store
}

#[test]
fn test_simple_assignment() {
    let mut store = parse_ok("VAR = \"value\"\n");
    assert_eq!(store.lookup("VAR").as_deref(), Some("value"));
}

#[test]
fn test_append_with_separator() {
    let mut store = parse_ok("VAR = \"a\"\nVAR += \"b\"\n");
    assert_eq!(store.lookup("VAR").as_deref(), Some("a b"));
}

#[test]
fn test_prepend_with_separator() {
    let mut store = parse_ok("VAR = \"tail\"\nVAR =+ \"head\"\n");
    assert_eq!(store.lookup("VAR").as_deref(), Some("head tail"));
}

#[test]
fn test_append_prepend_without_separator() {
    let mut store = parse_ok("VAR = \"b\"\nVAR .= \"c\"\nVAR =. \"a\"\n");
    assert_eq!(store.lookup("VAR").as_deref(), Some("abc"));
}

#[test]
fn test_separator_families_are_distinct() {
    let mut store = parse_ok("A = \"x\"\nA += \"y\"\nB = \"x\"\nB .= \"y\"\n");
    assert_eq!(store.lookup("A").as_deref(), Some("x y"));
    assert_eq!(store.lookup("B").as_deref(), Some("xy"));
}

#[test]
fn test_immediate_expansion_snapshots_value() {
    let mut store = parse_ok(concat!(
        "OTHER = \"one\"\n",
        "VAR := \"a${OTHER}\"\n",
        "OTHER = \"z\"\n",
    ));
    // The later redefinition of OTHER must not change the snapshot.
    assert_eq!(store.lookup("VAR").as_deref(), Some("aone"));
    assert_eq!(store.lookup("OTHER").as_deref(), Some("z"));
}

#[test]
fn test_deferred_expansion_tracks_latest_value() {
    let mut store = parse_ok(concat!(
        "OTHER = \"one\"\n",
        "VAR = \"a${OTHER}\"\n",
        "OTHER = \"z\"\n",
    ));
    assert_eq!(store.lookup("VAR").as_deref(), Some("az"));
}

#[test]
fn test_conditional_assignment_first_wins() {
    let mut store = parse_ok("VAR ?= \"x\"\nVAR ?= \"y\"\n");
    assert_eq!(store.lookup("VAR").as_deref(), Some("x"));
}

#[test]
fn test_conditional_assignment_noop_after_assignment() {
    let mut store = parse_ok("VAR = \"set\"\nVAR ?= \"ignored\"\n");
    assert_eq!(store.lookup("VAR").as_deref(), Some("set"));
}

#[test]
fn test_export_marks_variable() {
    let store = parse_ok("export PATH = \"/bin\"\n");
    assert!(store.is_exported("PATH"));
    assert!(!store.is_exported("OTHER"));
}

#[test]
fn test_addtask_before_after() {
    let store = parse_ok("addtask build before package after compile\n");
    let tasks = store.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "build");
    assert_eq!(tasks[0].before.as_deref(), Some("package"));
    assert_eq!(tasks[0].after.as_deref(), Some("compile"));
}

#[test]
fn test_addtask_swapped_order_fills_swapped_roles() {
    let store = parse_ok("addtask build after compile before package\n");
    let tasks = store.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "build");
    assert_eq!(tasks[0].before.as_deref(), Some("package"));
    assert_eq!(tasks[0].after.as_deref(), Some("compile"));
}

#[test]
fn test_addtask_plain() {
    let store = parse_ok("addtask fetch\n");
    assert_eq!(store.tasks()[0], braise::TaskEntry {
        name: "fetch".to_string(),
        before: None,
        after: None,
    });
}

#[test]
fn test_addhandler_and_inherit_lists() {
    let store = parse_ok(concat!(
        "addhandler build_started\n",
        "inherit autotools pkgconfig\n",
    ));
    assert_eq!(store.handlers(), ["build_started"]);
    assert_eq!(store.inherits(), ["autotools", "pkgconfig"]);
}

#[test]
fn test_export_functions_list() {
    let store = parse_ok("EXPORT_FUNCTIONS do_fetch do_build\n");
    assert_eq!(store.export_funcs(), ["do_fetch", "do_build"]);
}

#[test]
fn test_include_and_require_tagging() {
    let store = parse_ok(concat!(
        "include optional.conf\n",
        "require mandatory.conf\n",
    ));
    let includes = store.includes();
    assert_eq!(includes.len(), 2);
    assert_eq!(includes[0].path, "optional.conf");
    assert!(!includes[0].required);
    assert_eq!(includes[1].path, "mandatory.conf");
    assert!(includes[1].required);
}

#[test]
fn test_shell_function_body_verbatim() {
    let store = parse_ok(concat!(
        "do_build () {\n",
        "    make -j4\n",
        "    make install\n",
        "}\n",
    ));
    let funcs = store.funcs();
    assert_eq!(funcs.len(), 1);
    assert_eq!(funcs[0].name.as_deref(), Some("do_build"));
    assert_eq!(funcs[0].kind, FuncKind::Shell);
    assert_eq!(funcs[0].body, "    make -j4\n    make install\n");
}

#[test]
fn test_python_functions_named_and_anonymous() {
    let store = parse_ok(concat!(
        "python do_setup () {\n",
        "    d.setVar('A', '1')\n",
        "}\n",
        "python () {\n",
        "    pass\n",
        "}\n",
    ));
    let funcs = store.funcs();
    assert_eq!(funcs.len(), 2);
    assert_eq!(funcs[0].name.as_deref(), Some("do_setup"));
    assert_eq!(funcs[0].kind, FuncKind::Python);
    assert_eq!(funcs[1].name, None);
    assert_eq!(funcs[1].kind, FuncKind::Python);
    assert_eq!(funcs[1].body, "    pass\n");
}

#[test]
fn test_fakeroot_function() {
    let store = parse_ok("fakeroot do_install () {\n    install -d ${D}\n}\n");
    let funcs = store.funcs();
    assert_eq!(funcs[0].name.as_deref(), Some("do_install"));
    assert_eq!(funcs[0].kind, FuncKind::Fakeroot);
}

#[test]
fn test_def_function_raw_args_and_body() {
    let store = parse_ok(concat!(
        "def get_depends(d, extra):\n",
        "    if extra:\n",
        "        return extra\n",
        "    return d\n",
    ));
    let defs = store.defs();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name, "get_depends");
    assert_eq!(defs[0].args, "d, extra");
    assert_eq!(
        defs[0].body,
        "    if extra:\n        return extra\n    return d\n"
    );
}

#[test]
fn test_malformed_statement_reports_once_and_recovers() {
    let (mut store, report) = parse(concat!(
        "GOOD = \"1\"\n",
        "BROKEN = = \n",
        "ALSO_GOOD = \"2\"\n",
    ));
    assert_eq!(report.outcome, ParseOutcome::Accepted);
    assert_eq!(report.syntax_errors.len(), 1);
    assert_eq!(report.syntax_errors[0].line, 2);
    assert_eq!(store.lookup("GOOD").as_deref(), Some("1"));
    assert_eq!(store.lookup("ALSO_GOOD").as_deref(), Some("2"));
}

#[test]
fn test_separate_error_regions_report_separately() {
    let (mut store, report) = parse(concat!(
        "A = = \n",
        "B = \"1\"\n",
        "C = \"2\"\n",
        "D = = \n",
        "E = \"3\"\n",
    ));
    assert_eq!(report.outcome, ParseOutcome::Accepted);
    assert_eq!(report.syntax_errors.len(), 2);
    assert_eq!(store.lookup("B").as_deref(), Some("1"));
    assert_eq!(store.lookup("E").as_deref(), Some("3"));
}

#[test]
fn test_truncated_statement_fails() {
    let (_store, report) = parse("VAR = \n");
    // The value never arrives; the end marker lands mid-statement.
    assert_eq!(report.outcome, ParseOutcome::Failed);
}

#[test]
fn test_comments_and_blank_lines_ignored() {
    let mut store = parse_ok(concat!(
        "# header comment\n",
        "\n",
        "VAR = \"v\"\n",
        "\n",
        "# trailing comment\n",
    ));
    assert_eq!(store.lookup("VAR").as_deref(), Some("v"));
}

#[test]
fn test_realistic_recipe() {
    let mut store = parse_ok(concat!(
        "DESCRIPTION = \"An example package\"\n",
        "PRIORITY ?= \"optional\"\n",
        "SRC_URI = \"http://example.com/pkg-1.0.tar.gz\"\n",
        "DEPENDS = \"zlib\"\n",
        "DEPENDS += \"openssl\"\n",
        "export CFLAGS := \"-O2 -g\"\n",
        "\n",
        "inherit autotools\n",
        "include conf/site.conf\n",
        "require conf/layers.conf\n",
        "\n",
        "addtask fetch\n",
        "addtask build before package after fetch\n",
        "addhandler pkg_events\n",
        "EXPORT_FUNCTIONS do_fetch do_build\n",
        "\n",
        "do_build () {\n",
        "    oe_runmake\n",
        "}\n",
        "\n",
        "python () {\n",
        "    d.setVar('PARSED', '1')\n",
        "}\n",
        "\n",
        "def get_pv(d):\n",
        "    return '1.0'\n",
    ));

    assert_eq!(
        store.lookup("DESCRIPTION").as_deref(),
        Some("An example package")
    );
    assert_eq!(store.lookup("PRIORITY").as_deref(), Some("optional"));
    assert_eq!(store.lookup("DEPENDS").as_deref(), Some("zlib openssl"));
    assert_eq!(store.lookup("CFLAGS").as_deref(), Some("-O2 -g"));
    assert!(store.is_exported("CFLAGS"));
    assert_eq!(store.inherits(), ["autotools"]);
    assert_eq!(store.includes().len(), 2);
    assert_eq!(store.tasks().len(), 2);
    assert_eq!(store.handlers(), ["pkg_events"]);
    assert_eq!(store.export_funcs(), ["do_fetch", "do_build"]);
    assert_eq!(store.funcs().len(), 2);
    assert_eq!(store.defs().len(), 1);
}

#[test]
fn test_scope_priorities_across_parses() {
    // Base recipe at priority 0, then an override layer at priority 10
    // contributing to the same store.
    let mut store = MetadataStore::new();
    let report = parse_source("VAR = \"base\"\nVAR += \"one\"\n", "base.recipe", &mut store)
        .unwrap();
    assert_eq!(report.outcome, ParseOutcome::Accepted);

    store.enter_scope(10);
    let report = parse_source(
        "VAR = \"override\"\nVAR += \"two\"\n",
        "layer.recipe",
        &mut store,
    )
    .unwrap();
    assert_eq!(report.outcome, ParseOutcome::Accepted);

    // The higher-priority assignment hides the base chain entirely; the
    // higher-priority append layers on top of it.
    assert_eq!(store.lookup("VAR").as_deref(), Some("override two"));
}

#[test]
fn test_persist_roundtrip() {
    let mut store = parse_ok(concat!(
        "export PN = \"example\"\n",
        "DEPENDS = \"zlib\"\n",
        "DEPENDS += \"openssl\"\n",
    ));

    let backend = Backend::open_in_memory().unwrap();
    store.persist(&backend, "meta/example.recipe").unwrap();

    assert_eq!(
        backend.lookup_var("meta/example.recipe", "PN").unwrap().as_deref(),
        Some("example")
    );
    assert_eq!(
        backend
            .lookup_var("meta/example.recipe", "DEPENDS")
            .unwrap()
            .as_deref(),
        Some("zlib openssl")
    );

    let key = backend.register_recipe("meta/example.recipe").unwrap();
    assert_eq!(
        backend.lookup_attr(key, "PN", "export").unwrap().as_deref(),
        Some("1")
    );
}

#[test]
fn test_persist_is_repeatable() {
    let backend = Backend::open_in_memory().unwrap();

    let mut store = parse_ok("VAR = \"first\"\n");
    store.persist(&backend, "r").unwrap();

    let mut store = parse_ok("VAR = \"second\"\n");
    store.persist(&backend, "r").unwrap();

    // Re-persisting replaces the old rows rather than stacking them.
    assert_eq!(
        backend.lookup_var("r", "VAR").unwrap().as_deref(),
        Some("second")
    );
}
