//! Property and scenario tests for normalization, repair and validation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scenesmith_core::repair::scan::{ArgKind, Scan};
use scenesmith_core::{normalize, sanitize, validate, RepairEngine, RepairOptions, SceneError};

/// Scripts in the shapes language models actually produce.
fn corpus() -> Vec<&'static str> {
    vec![
        // Prose and fences around a scene with several API mistakes.
        "Here is the code for your animation:\n```python\nfrom manim import *\n\nclass Demo(Scene):\n    def construct(self):\n        title = Tex(\u{201C}Hello World\u{201D}, font_size=18)\n        circle = Circle(buff=1, radius=2, color=BLUE_C)\n        self.play(Write(title)\n        self.play(Create(circle), run_time=2)\n        title.next_to(circle, UP)\n        x = random.uniform(-1, 1)\n```\nWould you like me to add more?\n",
        // Bare statements with no scene class.
        "circle = Circle(radius=1, buff=0.2)\nsquare = Square()\narrow = Arrow(start, end=foo, bar)\nself.play(FadeIn(square)\n",
        // Missing block body and an unterminated string.
        "from manim import *\nclass Broken(Scene):\n    def construct(self):\n        for i in range(3):\n        label = Text(\"Step, font_size=12)\n        self.add(label)\n",
        // Deprecated and external-resource APIs.
        "from manim import *\n\nclass Graphs(Scene):\n    def construct(self):\n        eq = MathTex(\"y\", \"=\", \"x^2\", tex_template=TexTemplate())\n        graph = FunctionGraph(lambda x: x**2, x_min=-2, x_max=2, color=YELLOW)\n        logo = ImageMobject(\"logo.png\").scale(0.5)\n        code = Code(code=snippet, language=\"python\", insert_line_no=False)\n        self.play(Write(eq), Create(graph), FadeIn(logo))\n        eq.to_edge(UP)\n",
        // Extra, missing and foreign closers.
        "from manim import *\n\nclass Extra(Scene):\n    def construct(self):\n        dots = VGroup(*[Dot() for _ in range(5)]))\n        self.play(LaggedStart(*[FadeIn(d) for d in dots], lag_ratio=0.1)\n        self.wait(1]\n",
        // Fullwidth punctuation and duplicate keywords.
        "from manim import *\n\nclass Wide(Scene):\n    def construct(self):\n        t = Text\u{FF08}\"hi\"\u{FF0C} color=RED, color=BLUE\u{FF09}\n        self.play(run_time=1, FadeIn(t))\n",
        // Already clean.
        "from manim import *\n\n\nclass Clean(Scene):\n    def construct(self):\n        self.wait()\n",
    ]
}

fn repair(engine: &RepairEngine, src: &str) -> String {
    engine.repair(&normalize(src)).text
}

#[test]
fn test_normalize_idempotent_over_corpus() {
    for src in corpus() {
        let once = normalize(src);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn test_repair_idempotent() {
    for options in [RepairOptions::default(), RepairOptions { narration: true, max_passes: 2 }] {
        let engine = RepairEngine::new(options);
        for src in corpus() {
            let once = repair(&engine, src);
            let twice = engine.repair(&once).text;
            assert_eq!(twice, once, "not idempotent for input:\n{src}");
        }
    }
}

#[test]
fn test_repaired_corpus_parses() {
    let engine = RepairEngine::default();
    for src in corpus() {
        let out = repair(&engine, src);
        let result = validate(&out);
        assert!(result.valid, "invalid after repair ({result:?}):\n{out}");
    }
}

/// Every closer has an opener and nothing is left open, ignoring strings
/// and comments.
fn assert_balanced(out: &str) {
    let scan = Scan::new(out);
    let mut depth = 0i64;
    for (i, b) in out.bytes().enumerate() {
        if !scan.is_code(i) {
            continue;
        }
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        assert!(depth >= 0, "closer before opener in:\n{out}");
    }
    assert_eq!(depth, 0, "unbalanced:\n{out}");
}

/// No call passes a positional argument after a keyword argument.
fn assert_keyword_order(out: &str) {
    let scan = Scan::new(out);
    for call in scan.calls() {
        let Some(close) = call.close else { continue };
        if call.is_definition {
            continue;
        }
        let mut keyword_seen = false;
        for arg in scan.args(call.open, close) {
            match arg.kind {
                ArgKind::Keyword(_) | ArgKind::DoubleStar => keyword_seen = true,
                ArgKind::Positional => {
                    assert!(!keyword_seen, "positional after keyword in {}:\n{out}", call.name)
                }
                ArgKind::Star => {}
            }
        }
    }
}

#[test]
fn test_brackets_balanced_after_repair() {
    let engine = RepairEngine::default();
    for src in corpus() {
        assert_balanced(&repair(&engine, src));
    }
}

#[test]
fn test_no_positional_after_keyword() {
    let engine = RepairEngine::default();
    for src in corpus() {
        assert_keyword_order(&repair(&engine, src));
    }
}

// ---------------------------------------------------------------------------
// Generated scripts
// ---------------------------------------------------------------------------

/// Statements with the mistakes generated scripts tend to make.
const STATEMENTS: &[&str] = &[
    "circle = Circle(radius=2, color=BLUE)",
    "circle = Circle (buff=1, radius=2)",
    "arrow = Arrow(start, end=foo, bar)",
    "arrow = Arrow (start, end=foo, bar)",
    "title = Text(\"Hello\", font_size=12, color=RED, color=BLUE)",
    "label = Text (font_size=10, \"spaced\")",
    "eq = MathTex(\"E\", \"=\", \"mc^2\")",
    "self.play(Create(circle), run_time=2)",
    "self.play(run_time=1, FadeIn(title))",
    "self.play (run_time=1, Write(eq))",
    "title.next_to(circle, UP)",
    "title.to_edge (DOWN)",
    "dots = VGroup(*[Dot() for _ in range(3)])",
    "graph = FunctionGraph(lambda x: x, x_min=-1, x_max=1)",
    "self.wait(1)",
    "quote = Text(\u{201C}quoted\u{201D})",
    "wide = Text\u{FF08}\"wide\"\u{FF0C} color=RED\u{FF09}",
    "x = random.uniform(-1, 1)",
    "if x in (1, 2):",
    "for i in range(3):",
];

/// Lines that are not code at all.
const NOISE: &[&str] = &["```python", "```", "Here is your animation:", "Let me know if you need changes."];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

/// A statement, sometimes with a bracket dropped or added.
fn mutate(rng: &mut StdRng, statement: &str) -> String {
    match rng.random_range(0..6) {
        0 => statement.strip_suffix(')').unwrap_or(statement).to_string(),
        1 => format!("{statement})"),
        2 => format!("{statement}]"),
        _ => statement.to_string(),
    }
}

/// A script that is sometimes wrapped in a scene, sometimes bare, and
/// sometimes surrounded by prose.
fn generate(rng: &mut StdRng) -> String {
    let in_scene = rng.random_bool(0.7);
    let mut lines = Vec::new();
    if rng.random_bool(0.3) {
        lines.push(pick(rng, NOISE).to_string());
    }
    if in_scene {
        lines.push("from manim import *".to_string());
        lines.push(String::new());
        lines.push("class Generated(Scene):".to_string());
        lines.push("    def construct(self):".to_string());
    }
    let indent = if in_scene { "        " } else { "" };
    for _ in 0..rng.random_range(1..8) {
        let statement = pick(rng, STATEMENTS);
        let statement = mutate(rng, statement);
        lines.push(format!("{indent}{statement}"));
    }
    if rng.random_bool(0.2) {
        lines.push(pick(rng, NOISE).to_string());
    }
    lines.join("\n") + "\n"
}

#[test]
fn test_generated_scripts_hold_repair_invariants() {
    for (seed, narration) in [(7, false), (11, true)] {
        let mut rng = StdRng::seed_from_u64(seed);
        let engine = RepairEngine::new(RepairOptions { narration, max_passes: 2 });
        for _ in 0..300 {
            let src = generate(&mut rng);
            let once = repair(&engine, &src);
            assert_eq!(engine.repair(&once).text, once, "not idempotent for input:\n{src}");
            assert_balanced(&once);
            assert_keyword_order(&once);
        }
    }
}

#[test]
fn test_generated_scripts_sanitize_to_typed_result() {
    let mut rng = StdRng::seed_from_u64(23);
    let engine = RepairEngine::default();
    for _ in 0..300 {
        let src = generate(&mut rng);
        match sanitize(&src, &engine) {
            Ok(sanitized) => assert!(validate(&sanitized.text).valid),
            Err(SceneError::SanitizationFailed { .. }) => {}
            Err(other) => panic!("unexpected error {other:?} for input:\n{src}"),
        }
    }
}

#[test]
fn test_spaced_arrow_repaired_and_parses() {
    let src = "from manim import *\n\nclass A(Scene):\n    def construct(self):\n        a = Arrow (start, end=foo, bar)\n";
    let out = sanitize(src, &RepairEngine::default()).unwrap();
    assert!(out.text.contains("Arrow(start, bar, end=foo)"), "{}", out.text);
    assert!(!out.remediated);
}

#[test]
fn test_validator_agrees_with_reference_parser() {
    let samples = [
        "x = 1\n",
        "def f(:\n",
        "class A(Scene):\n    def construct(self):\n        pass\n",
        "f(a=1, b)\n",
        "",
    ];
    for src in samples {
        let ours = validate(src).valid;
        let reference =
            rustpython_parser::parse(src, rustpython_parser::Mode::Module, "<test>").is_ok();
        assert_eq!(ours, reference, "disagreement on {src:?}");
    }
}

#[test]
fn test_circle_buff_removed_without_dangling_comma() {
    let src = "from manim import *\n\nclass A(Scene):\n    def construct(self):\n        circle = Circle(buff=1, radius=2)\n";
    let out = repair(&RepairEngine::default(), src);
    assert!(out.contains("circle = Circle(radius=2)"), "{out}");
    assert!(!out.contains("buff"));
    assert!(validate(&out).valid);
}

#[test]
fn test_arrow_positional_moved_before_keyword() {
    let out = repair(&RepairEngine::default(), "arrow = Arrow(start, end=foo, bar)\n");
    assert!(out.contains("Arrow(start, bar, end=foo)"), "{out}");
}

#[test]
fn test_empty_submission_is_input_empty() {
    let engine = RepairEngine::default();
    assert!(matches!(sanitize("", &engine), Err(SceneError::InputEmpty)));
    assert!(matches!(sanitize("\u{FEFF}\u{200B}  \n", &engine), Err(SceneError::InputEmpty)));
}

#[test]
fn test_narration_upgrade_through_sanitize() {
    let engine = RepairEngine::new(RepairOptions { narration: true, max_passes: 2 });
    let src = "from manim import *\n\nclass Story(Scene):\n    def construct(self):\n        with self.voiceover(text=\"A circle appears\") as tracker:\n            self.play(Create(Circle()), run_time=tracker.duration)\n";
    let out = sanitize(src, &engine).unwrap();
    assert!(out.text.contains("class Story(VoiceoverScene):"));
    assert!(out.text.contains("self.set_speech_service(GTTSService())"));
    assert!(out.text.contains("from manim_voiceover import VoiceoverScene"));
    assert!(out.record.rules().contains(&"narration-upgrade"));
}
