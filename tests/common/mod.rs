use retex::{Conversion, Converter, RewriteError, StaticContext};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Convert with the default rule table and an empty context.
pub fn convert(html: &str) -> Result<Conversion, RewriteError> {
    Converter::new()?.convert(html)
}

/// Convert with relative links resolved against `base_url`.
pub fn convert_with_base(html: &str, base_url: &str) -> Result<Conversion, RewriteError> {
    let converter = Converter::builder()?
        .context(StaticContext::new().with_base_url(base_url))
        .build();
    converter.convert(html)
}

/// The package names of a conversion, in preamble order.
pub fn package_names(conversion: &Conversion) -> Vec<&str> {
    conversion
        .packages
        .iter()
        .map(|package| package.name.as_str())
        .collect()
}

/// A small article exercising most of the default rule table at once.
pub fn sample_article() -> &'static str {
    concat!(
        "<!DOCTYPE html>\n",
        "<!-- exported 2024-03-01 -->\n",
        "<h1>User guide</h1>\n",
        "<p>Welcome to the <b>guide</b> &amp; reference.</p>\n",
        "<ul><li>First</li><li>Second</li></ul>\n",
        "<table border=\"1\">",
        "<tr><th>Name</th><th>Size</th></tr>",
        "<tr><td>alpha</td><td>1</td></tr>",
        "</table>\n",
        "<p>See <a href=\"https://example.org/\">the site</a>.</p>\n",
    )
}
