mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{TestResult, package_names};
use retex::{Converter, Invocation, Placeholder, RewriteError, Rule, SubConverter};

/// Stows inline SVG markup as an image file and references it from the
/// output.
#[derive(Debug, Default)]
struct SvgConverter {
    emitted: AtomicUsize,
}

impl SubConverter for SvgConverter {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let index = self.emitted.fetch_add(1, Ordering::Relaxed) + 1;
        let file = format!("figure-{index}.svg");
        let source = invocation.matched().to_string();
        invocation.files().add_file(&file, source.into_bytes());
        invocation.use_package("graphicx", &[], None)?;
        invocation.replace_and_lock(format!("\\includegraphics{{{file}}}"));
        Ok(())
    }
}

#[test]
fn test_custom_handler_emits_files() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let converter = Converter::builder()?
        .handler(
            Placeholder::Top,
            r"(?is)<svg\b.*?</svg\s*>",
            SvgConverter::default(),
        )?
        .build();
    let conversion = converter.convert(concat!(
        "<p>Before.</p>",
        "<p><svg viewBox=\"0 0 1 1\"><rect/></svg></p>",
        "<p>After.</p>",
        "<p><svg><circle/></svg></p>",
    ))?;

    // The emitted LaTeX survives the escape rules untouched.
    assert_eq!(
        conversion.latex,
        "Before.\n\n\\includegraphics{figure-1.svg}\n\nAfter.\n\n\\includegraphics{figure-2.svg}"
    );
    assert!(package_names(&conversion).contains(&"graphicx"));
    assert_eq!(conversion.files.len(), 2);
    assert_eq!(
        conversion.files.get("figure-1.svg").map(Vec::as_slice),
        Some("<svg viewBox=\"0 0 1 1\"><rect/></svg>".as_bytes())
    );
    Ok(())
}

#[test]
fn test_handler_files_do_not_leak_across_calls() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let converter = Converter::builder()?
        .handler(
            Placeholder::Top,
            r"(?is)<svg\b.*?</svg\s*>",
            SvgConverter::default(),
        )?
        .build();
    converter.convert("<svg><g/></svg>")?;
    let second = converter.convert("plain text")?;

    assert!(second.files.is_empty());
    assert!(second.packages.is_empty());
    Ok(())
}

#[test]
fn test_call_rules_replace_custom_handlers_too() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let converter = Converter::builder()?
        .handler(
            Placeholder::Top,
            r"(?is)<svg\b.*?</svg\s*>",
            SvgConverter::default(),
        )?
        .build();
    // Same search key, so the call rule takes the handler's slot.
    let conversion = converter.convert_with(
        "x <svg><g/></svg> y",
        [(
            Placeholder::Top,
            Rule::regex(r"(?is)<svg\b.*?</svg\s*>", "(figure omitted)")?,
        )],
    )?;

    assert_eq!(conversion.latex, "x (figure omitted) y");
    assert!(conversion.files.is_empty());
    Ok(())
}
