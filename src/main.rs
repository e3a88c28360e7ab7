use retex::{Converter, StaticContext};
use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;

/// A small CLI around the converter: HTML in, LaTeX out.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut base_url: Option<String> = None;
    let mut with_preamble = false;
    let mut paths: Vec<String> = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--base-url" => match iter.next() {
                Some(value) => base_url = Some(value.clone()),
                None => usage(&args[0]),
            },
            "--preamble" => with_preamble = true,
            "-h" | "--help" => usage(&args[0]),
            other if other.starts_with('-') && other != "-" => usage(&args[0]),
            _ => paths.push(arg.clone()),
        }
    }
    if paths.len() > 2 {
        usage(&args[0]);
    }

    let html = match paths.first().map(String::as_str) {
        Some("-") | None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        Some(path) => fs::read_to_string(path)?,
    };

    let mut context = StaticContext::new();
    if let Some(base) = base_url {
        context = context.with_base_url(base);
    }
    let converter = Converter::builder()?.context(context).build();
    log::debug!("{} rules loaded", converter.rules().len());
    let conversion = converter.convert(&html)?;
    log::debug!(
        "converted {} bytes of markup into {} bytes of LaTeX",
        html.len(),
        conversion.latex.len()
    );

    let mut output = String::new();
    if with_preamble && !conversion.packages.is_empty() {
        output.push_str(&conversion.preamble());
        output.push_str("\n\n");
    }
    output.push_str(&conversion.latex);
    output.push('\n');

    let output_path = paths.get(1).filter(|path| path.as_str() != "-");
    match output_path {
        Some(path) => fs::write(path, &output)?,
        None => io::stdout().write_all(output.as_bytes())?,
    }

    if !with_preamble {
        for package in &conversion.packages {
            eprintln!("requires: {}", package.to_latex());
        }
    }
    if !conversion.files.is_empty() {
        match output_path {
            Some(path) => {
                let dir = Path::new(path)
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                for (name, data) in &conversion.files {
                    log::debug!("writing auxiliary file {}", dir.join(name).display());
                    fs::write(dir.join(name), data)?;
                }
            }
            None => eprintln!(
                "{} auxiliary file(s) not written; give an output path to keep them",
                conversion.files.len()
            ),
        }
    }
    Ok(())
}

fn usage(program: &str) -> ! {
    eprintln!("Convert HTML fragments to LaTeX.");
    eprintln!();
    eprintln!("Usage: {program} [options] [input.html] [output.tex]");
    eprintln!();
    eprintln!("Reads standard input when no input file (or '-') is given and");
    eprintln!("writes standard output when no output file (or '-') is given.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --base-url <url>   resolve relative links against <url>");
    eprintln!("  --preamble         emit \\usepackage lines before the body");
    eprintln!("  -h, --help         show this help");
    process::exit(1);
}
