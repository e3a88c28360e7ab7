mod common;

use common::{TestResult, convert, convert_with_base, package_names, sample_article};

#[test]
fn test_plain_inline_fragment() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("Hello <b>World</b>!")?;
    assert_eq!(conversion.latex, "Hello \\textbf{World}!");
    assert!(conversion.packages.is_empty());
    assert!(conversion.files.is_empty());
    Ok(())
}

#[test]
fn test_paragraphs_and_inline_styles() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("<p>A <b>bold</b> and <i>subtle</i> point.</p><p>Next.</p>")?;
    assert_eq!(
        conversion.latex,
        "A \\textbf{bold} and \\textit{subtle} point.\n\nNext."
    );
    assert!(conversion.packages.is_empty());
    Ok(())
}

#[test]
fn test_named_entities_decode_and_escape() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("M&auml;rz &amp; Mai")?;
    assert_eq!(conversion.latex, "M\u{e4}rz \\& Mai");
    Ok(())
}

#[test]
fn test_counterfeit_entity_stays_text() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    // "&amp;#62;" is an ampersand followed by text, never a ">".
    let conversion = convert("a &amp;#62; b")?;
    assert_eq!(conversion.latex, "a \\&\\#62; b");
    Ok(())
}

#[test]
fn test_encoded_angle_brackets() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("for x &lt; 10 &gt; y")?;
    assert_eq!(conversion.latex, "for x \\textless{} 10 \\textgreater{} y");
    Ok(())
}

#[test]
fn test_relative_links_resolve_against_base() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert_with_base(
        "<a href=\"ch1.html\">Chapter 1</a>",
        "https://docs.example/guide/",
    )?;
    assert_eq!(
        conversion.latex,
        "\\href{https://docs.example/guide/ch1.html}{Chapter 1}"
    );
    assert_eq!(package_names(&conversion), vec!["hyperref"]);
    Ok(())
}

#[test]
fn test_footnote_spans() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("Fact<span class=\"footnote\">Smith 2020</span>.")?;
    assert_eq!(conversion.latex, "Fact\\footnote{Smith 2020}.");
    Ok(())
}

#[test]
fn test_bare_urls_get_wrapped() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("Visit https://example.org/docs, then return.")?;
    assert_eq!(
        conversion.latex,
        "Visit \\url{https://example.org/docs}, then return."
    );
    assert_eq!(package_names(&conversion), vec!["hyperref"]);
    Ok(())
}

#[test]
fn test_pre_blocks_become_verbatim() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("<pre><code>if a &lt; b { swap(); }</code></pre>")?;
    assert_eq!(
        conversion.latex,
        "\\begin{verbatim}\nif a < b { swap(); }\n\\end{verbatim}"
    );
    Ok(())
}

#[test]
fn test_strikeout_uses_ulem() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("the <s>old</s> new way")?;
    assert_eq!(conversion.latex, "the \\sout{old} new way");
    assert_eq!(package_names(&conversion), vec!["ulem"]);
    assert_eq!(conversion.packages[0].options, vec!["normalem".to_string()]);
    Ok(())
}

#[test]
fn test_unknown_markup_is_stripped() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("<main><section data-x=\"1\">kept</section></main>")?;
    assert_eq!(conversion.latex, "kept");
    Ok(())
}

#[test]
fn test_whitespace_collapses() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("a   b\n\n\n\nc")?;
    assert_eq!(conversion.latex, "a b\n\nc");
    Ok(())
}

#[test]
fn test_dangling_line_break_is_removed() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert("<p>one<br></p><p>two</p>")?;
    assert_eq!(conversion.latex, "one\n\ntwo");
    Ok(())
}

#[test]
fn test_full_article() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let conversion = convert(sample_article())?;
    let latex = &conversion.latex;
    assert!(latex.contains("\\section{User guide}"));
    assert!(latex.contains("Welcome to the \\textbf{guide} \\& reference."));
    assert!(latex.contains("\\begin{itemize}\n\\item First\n\\item Second\n\\end{itemize}"));
    assert!(latex.contains("\\begin{tabular}{|l|l|}"));
    assert!(latex.contains("\\textbf{Name} & \\textbf{Size}"));
    assert!(latex.contains("\\href{https://example.org/}{the site}"));
    assert!(!latex.contains("exported 2024"));
    assert!(!latex.contains('<'));
    let names = package_names(&conversion);
    assert!(names.contains(&"array"));
    assert!(names.contains(&"hyperref"));
    Ok(())
}

#[test]
fn test_convert_bytes_roundtrip() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();

    let converter = retex::Converter::new()?;
    let conversion = converter.convert_bytes("gr&uuml;n".as_bytes())?;
    assert_eq!(conversion.latex, "gr\u{fc}n");
    Ok(())
}
