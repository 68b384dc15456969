//! msc — the MS compiler driver.
//!
//! Parses the input file and its imports, translates them to the backend
//! HDL, writes the result into a fresh temporary directory, and invokes
//! the backend to typecheck and to produce the requested artifacts
//! (simulation executable, Verilog, or the translated source itself).

#![warn(missing_docs)]

use clap::Parser;
use msc_backend::{report_backend_output, run_bsc};
use msc_diagnostics::{error_colored, hl_colored, warn_colored, Reporter};
use msc_elaborate::{translate_files, StepLimiter};
use msc_syntax::imports::parse_file_and_imports;
use msc_syntax::SyntaxDb;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// The MS compiler.
#[derive(Parser, Debug)]
#[command(name = "msc", about = "MS compiler", disable_version_flag = true)]
struct Cli {
    /// Input file.
    input_file: Option<String>,

    /// Name of the module/function to compile (if not given, checks the
    /// input for correctness).
    top_level: Option<String>,

    /// Type of output(s) desired: sim (simulation executable), verilog
    /// (or v), bsv (translated file). Use commas to specify multiple
    /// outputs (e.g., -o sim,verilog). [default: sim]
    #[arg(short, long)]
    output: Option<String>,

    /// Path for source files (for multiple directories, use : as separator).
    #[arg(short, long, default_value = "")]
    path: String,

    /// Extra options for the Bluespec compiler (use quotes for multiple
    /// options).
    #[arg(short = 'b', long = "bscOpts", default_value = "")]
    bsc_opts: String,

    /// Report all errors and warnings (by default, similar/repeating
    /// errors are filtered).
    #[arg(long)]
    all_errors: bool,

    /// Keep temporary files around (useful for compiler debugging).
    #[arg(long)]
    keep_tmps: bool,

    /// Show version information.
    #[arg(short = 'v', long)]
    version: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

fn fail(msg: &str) -> ExitCode {
    eprintln!("{} {msg}", error_colored("error:"));
    ExitCode::FAILURE
}

fn warn(msg: &str) {
    eprintln!("{} {msg}", warn_colored("warning:"));
}

/// The phase barrier: once any errors have been reported, print the
/// omitted-errors hint (if brief-mode deduplication suppressed some) and
/// stop.
fn exit_code_if_errors(reporter: &Reporter) -> Option<ExitCode> {
    if !reporter.has_errors() {
        return None;
    }
    if let Some(note) = reporter.omitted_note() {
        eprintln!("{note}");
    }
    Some(ExitCode::FAILURE)
}

/// Sanitizes a top-level string into a filesystem-friendly artifact name:
/// `f#(4,Bit#(8))` becomes `f_4_Bit_8`.
fn sanitize_out_name(top_level: &str) -> String {
    top_level
        .chars()
        .filter_map(|c| match c {
            '#' | ',' => Some('_'),
            '(' | ')' | ' ' | '\'' | '\t' => None,
            other => Some(other),
        })
        .collect()
}

fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    paths.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

struct Outputs {
    sim: bool,
    verilog: bool,
    bsv: bool,
    /// Whether the user left `--output` at its default.
    default: bool,
}

fn parse_outputs(arg: &Option<String>) -> Result<Outputs, ExitCode> {
    let default = arg.is_none();
    let spec = arg.clone().unwrap_or_else(|| "sim".to_string());
    let mut outs = Outputs {
        sim: false,
        verilog: false,
        bsv: false,
        default,
    };
    for out in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match out {
            "bsv" => outs.bsv = true,
            "sim" => outs.sim = true,
            "verilog" | "v" => outs.verilog = true,
            other => {
                return Err(fail(&format!(
                    "invalid output type {} (full argument: {})",
                    error_colored(&format!("'{other}'")),
                    error_colored(&format!("'{spec}'"))
                )))
            }
        }
    }
    Ok(outs)
}

fn run(cli: &Cli) -> Result<(), ExitCode> {
    if cli.version {
        println!("MS compiler version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let Some(input_file) = cli.input_file.as_deref() else {
        return Err(fail("no input file"));
    };
    let top_level = cli.top_level.clone().unwrap_or_default();
    let outputs = parse_outputs(&cli.output)?;
    let reporter = Reporter::new(cli.all_errors);

    // The MS search path: the input file's directory, the --path entries,
    // and the current directory. Catching current-folder includes avoids
    // some corner cases without clobbering same-dir includes.
    let mut path: Vec<PathBuf> = Vec::new();
    path.push(
        Path::new(input_file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    );
    for dir in cli.path.split(':').filter(|d| !d.is_empty()) {
        path.push(PathBuf::from(dir));
    }
    path.push(PathBuf::new());
    let path = dedup_paths(path);

    // Parse all files; bails on the first lex/parse error.
    let mut db = SyntaxDb::new();
    let trees = match parse_file_and_imports(&mut db, Path::new(input_file), &path) {
        Ok(trees) => trees,
        Err(rendered) => {
            eprintln!("{}", rendered.trim_end());
            return Err(ExitCode::FAILURE);
        }
    };

    // Translate to the backend HDL.
    let sm = match translate_files(&mut db, &trees, &top_level, &reporter, StepLimiter::new())
    {
        Ok(sm) => sm,
        Err(fatal) => {
            eprintln!("{}", fatal.message.trim_end());
            return Err(ExitCode::FAILURE);
        }
    };
    if let Some(code) = exit_code_if_errors(&reporter) {
        return Err(code);
    }

    // Save the translated code into a fresh temp dir.
    let tmp_dir = tempfile::Builder::new()
        .prefix("tmp_msc_")
        .tempdir_in(".")
        .map_err(|_| fail("could not create temporary directory"))?;
    let (tmp_path, _tmp_guard) = if cli.keep_tmps {
        let kept = tmp_dir.into_path();
        println!(
            "storing temporary files in {}",
            hl_colored(&kept.display().to_string())
        );
        (kept, None)
    } else {
        (tmp_dir.path().to_path_buf(), Some(tmp_dir))
    };
    let bsv_file = tmp_path.join("Translated.bsv");
    fs::write(&bsv_file, format!("{}\n", sm.code()))
        .map_err(|_| fail(&format!("could not open output file {}", bsv_file.display())))?;

    // The backend include path is the MS path with relative entries
    // rebased, because the backend runs with the temp dir as its CWD.
    let mut bsc_path = String::new();
    for dir in &path {
        if dir.is_relative() {
            bsc_path.push_str("../");
        }
        bsc_path.push_str(&dir.display().to_string());
        bsc_path.push(':');
    }
    bsc_path.push_str("%:+");
    let mut base_opts: Vec<String> = vec!["-p".to_string(), bsc_path];
    base_opts.extend(cli.bsc_opts.split_whitespace().map(String::from));

    let out_name = if top_level.is_empty() {
        Path::new(input_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        sanitize_out_name(&top_level)
    };

    let run_backend = |extra: &[String]| -> Result<(), ExitCode> {
        let mut args = base_opts.clone();
        args.extend(extra.iter().cloned());
        let res = run_bsc(&tmp_path, &args)
            .map_err(|_| fail("could not invoke the backend compiler (is bsc in PATH?)"))?;
        report_backend_output(&res.output, &sm, &db, &top_level, &reporter);
        if let Some(code) = exit_code_if_errors(&reporter) {
            return Err(code);
        }
        if !res.success {
            // No parsed error but a failing exit usually means the backend
            // itself is broken or missing pieces; show its raw output.
            return Err(fail(&format!("could not compile file: {}", res.output)));
        }
        Ok(())
    };

    let mut typechecked = false;

    if outputs.sim {
        if !top_level.is_empty() && top_level.starts_with(|c: char| c.is_ascii_uppercase()) {
            run_backend(&strings(&[
                "-sim",
                "-g",
                sm.top_module(),
                "-u",
                "Translated.bsv",
            ]))?;
            typechecked = true;
            let link_target = format!("../{out_name}");
            run_backend(&strings(&[
                "-sim",
                "-e",
                sm.top_module(),
                "-o",
                link_target.as_str(),
            ]))?;
            println!("produced simulation executable {}", hl_colored(&out_name));
        } else if !outputs.default {
            let problem = if top_level.is_empty() {
                "did not provide a top-level module"
            } else {
                "specified a top-level function, which can't be simulated"
            };
            warn(&format!(
                "you asked for sim output but {problem}, so not producing simulation executable"
            ));
        }
    }

    if outputs.verilog {
        if !top_level.is_empty() {
            run_backend(&strings(&[
                "-verilog",
                "-g",
                sm.top_module(),
                "-u",
                "Translated.bsv",
            ]))?;
            typechecked = true;
            let verilog_src = tmp_path.join(format!("{}.v", sm.top_module()));
            let verilog_dst = format!("{out_name}.v");
            fs::copy(&verilog_src, &verilog_dst)
                .map_err(|_| fail("could not copy verilog file"))?;
            println!("produced verilog output {}", hl_colored(&verilog_dst));
        } else if !outputs.default {
            warn(
                "you asked for verilog output but did not provide a top-level module or \
                 function, so not producing verilog",
            );
        }
    }

    if !typechecked {
        run_backend(&strings(&["-u", "Translated.bsv"]))?;
        println!("no errors found on {}", hl_colored(input_file));
    }

    if outputs.bsv {
        let dst = format!("{out_name}.bsv");
        fs::copy(&bsv_file, &dst).map_err(|_| fail("could not copy bsv file"))?;
        println!("produced bsv output {}", hl_colored(&dst));
    }

    Ok(())
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_parametric_names() {
        assert_eq!(sanitize_out_name("f#(4)"), "f_4");
        assert_eq!(sanitize_out_name("Mod#(Bit#(8), 2)"), "Mod_Bit_8_2");
        assert_eq!(sanitize_out_name("Top"), "Top");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let deduped = dedup_paths(vec![
            PathBuf::from("a"),
            PathBuf::from("b"),
            PathBuf::from("a"),
            PathBuf::new(),
            PathBuf::new(),
        ]);
        assert_eq!(
            deduped,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::new()]
        );
    }

    #[test]
    fn output_spec_parsing() {
        let outs = parse_outputs(&None).unwrap();
        assert!(outs.sim && !outs.verilog && !outs.bsv && outs.default);

        let outs = parse_outputs(&Some("sim,verilog".to_string())).unwrap();
        assert!(outs.sim && outs.verilog && !outs.default);

        let outs = parse_outputs(&Some("v,bsv".to_string())).unwrap();
        assert!(outs.verilog && outs.bsv);

        assert!(parse_outputs(&Some("netlist".to_string())).is_err());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "msc",
            "alu.ms",
            "ALU#(32)",
            "-o",
            "sim,bsv",
            "-p",
            "lib:gen",
            "--all-errors",
            "--keep-tmps",
        ]);
        assert_eq!(cli.input_file.as_deref(), Some("alu.ms"));
        assert_eq!(cli.top_level.as_deref(), Some("ALU#(32)"));
        assert_eq!(cli.output.as_deref(), Some("sim,bsv"));
        assert_eq!(cli.path, "lib:gen");
        assert!(cli.all_errors);
        assert!(cli.keep_tmps);
    }
}
