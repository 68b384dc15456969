//! Back-translation of backend diagnostics into MS terms.
//!
//! The backend reports against the emitted `Translated.bsv`; every
//! location is rewritten through the source map, quoted syntax elements
//! get constructor names (`mkFoo`) folded back to module names, and a
//! catalogue of known error codes is rephrased for users who have never
//! seen the backend HDL. Unrecognized codes fall through to a generic
//! template that still gets re-anchored locations.

use msc_diagnostics::{error_colored, hl_colored, warn_colored, Reporter};
use msc_elaborate::SourceMap;
use msc_syntax::context::context_str;
use msc_syntax::SyntaxDb;
use regex::Regex;
use std::sync::OnceLock;

/// In-band newline substitute; never appears in backend output, so a
/// record's text can be scanned as a single line.
const LINE_TERM: &str = " _@%@_ ";

/// The name the translated file is written under.
pub const TRANSLATED_FILE: &str = "Translated.bsv";

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(Warning|Error): ").unwrap())
}

fn loc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(\S+)",\s+line\s+(\d+),\s+column\s+(\d+)"#).unwrap())
}

fn hdr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^"(\S+)",\s+line\s+(\d+),\s+column\s+(\d+):\s+\((\S+)\)"#).unwrap()
    })
}

fn elem_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`(.*?)'").unwrap())
}

fn t0020_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"type error at: (.*?) Expected type: (.*?) Inferred type: (.*?)$").unwrap()
    })
}

fn t0080_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"type error at the use of the following function: (.*?) The expected return type of the function: (.*?) The return type according to the use: (.*?)$",
        )
        .unwrap()
    })
}

fn t0031_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"no instances of the form:\s+(\S+)#\((.*)\)").unwrap())
}

fn g0005_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"The assertion `fire_when_enabled' failed for rule `(.*?)' because it is blocked by rule (.*?) in the scheduler",
        )
        .unwrap()
    })
}

/// Parses the backend's raw diagnostic text and routes every record,
/// re-anchored and specialized, to the reporter.
pub fn report_backend_output(
    raw: &str,
    sm: &SourceMap,
    db: &SyntaxDb,
    top_level: &str,
    reporter: &Reporter,
) {
    let flat = raw.replace('\n', LINE_TERM);

    let translate_loc = |line: u32, col: u32| -> String {
        match sm.find(line, col) {
            Some(node) => db.loc(node),
            None => format!("(translated bsv:{line}:{col})"),
        }
    };

    let translate_all_locs = |msg: &mut String| {
        loop {
            let Some((whole, file, line, col)) = loc_re().captures(msg).map(|caps| {
                (
                    caps.get(0).unwrap().range(),
                    caps[1].to_string(),
                    caps[2].parse().unwrap_or(0u32),
                    caps[3].parse().unwrap_or(0u32),
                )
            }) else {
                break;
            };
            let loc = if file == TRANSLATED_FILE {
                translate_loc(line, col)
            } else {
                format!("{file}:{line}:{col}")
            };
            msg.replace_range(whole, &hl_colored(&loc));
        }
    };

    let report_unknown = |is_error: bool, msg: &str| {
        let mut msg = msg.replace(LINE_TERM, "\n");
        translate_all_locs(&mut msg);
        let header = if is_error {
            error_colored("error:")
        } else {
            warn_colored("warning:")
        };
        let full = format!("{header} {msg}\n");
        if is_error {
            reporter.error(full, "", None);
        } else {
            reporter.warning(full, "", None);
        }
    };

    // Iterate records: each starts at a Warning:/Error: marker and runs to
    // the next marker (the regex engine has no lookahead, so slice between
    // marker positions).
    let markers: Vec<_> = marker_re().captures_iter(&flat).collect();
    for (i, caps) in markers.iter().enumerate() {
        let is_error = &caps[1] == "Error";
        let msg_start = caps.get(0).unwrap().end();
        let msg_end = markers
            .get(i + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(flat.len());
        let msg = &flat[msg_start..msg_end];

        let Some(hdr) = hdr_re().captures(msg) else {
            // Headerless records: the common one is the command-line
            // complaint about an unbound top-level constructor.
            if !top_level.is_empty()
                && msg.contains("Command line:")
                && msg.contains("Unbound variable `mk")
            {
                let is_module = top_level.starts_with(|c: char| c.is_ascii_uppercase());
                let full = format!(
                    "{} cannot find top-level {} {}",
                    error_colored("error:"),
                    if is_module { "module" } else { "function" },
                    error_colored(&format!("'{top_level}'"))
                );
                if is_error {
                    reporter.error(full, "", None);
                } else {
                    reporter.warning(full, "", None);
                }
            } else {
                report_unknown(is_error, msg);
            }
            continue;
        };

        let file = hdr[1].to_string();
        let line: u32 = hdr[2].parse().unwrap_or(0);
        let col: u32 = hdr[3].parse().unwrap_or(0);
        let code = hdr[4].to_string();
        let mut body = msg[hdr.get(0).unwrap().end()..].to_string();

        if file != TRANSLATED_FILE {
            report_unknown(is_error, &format!("in imported BSV file {msg}"));
            continue;
        }

        body = body.replace(LINE_TERM, " ").replace("  ", " ");
        let loc = translate_loc(line, col);
        body = body.trim().to_string();
        let unprocessed_body = body.clone();
        if let Some(first) = body.get_mut(..1) {
            first.make_ascii_lowercase();
        }
        translate_all_locs(&mut body);

        // Quoted syntax elements: collect for exact source-map lookup and
        // colorize, folding constructor names back to module names.
        let mut elems: Vec<String> = Vec::new();
        loop {
            let Some((whole, mut elem)) = elem_re()
                .captures(&body)
                .map(|caps| (caps.get(0).unwrap().range(), caps[1].to_string()))
            else {
                break;
            };
            if elem.len() > 2
                && elem.starts_with("mk")
                && elem.as_bytes()[2].is_ascii_uppercase()
            {
                elem = elem[2..].to_string();
            }
            let replacement = error_colored(&format!("'{elem}'"));
            elems.push(elem);
            body.replace_range(whole, &replacement);
        }

        // Specialize the known-code catalogue; unmatched bodies fall
        // through with the generic wording.
        match code.as_str() {
            "T0020" | "T0080" => {
                // T0020 is for expressions and T0080 for functions, but
                // the backend implements several constants as functions
                // (True, False), so both get the same wording.
                let re = if code == "T0020" { t0020_re() } else { t0080_re() };
                if let Some(caps) = re.captures(&body.clone()) {
                    let elem = caps[1].to_string();
                    let expected = caps[2].to_string();
                    let inferred = caps[3].to_string();
                    body = format!(
                        "expression {} has type {}, but use requires type {}",
                        error_colored(&format!("'{elem}'")),
                        hl_colored(&inferred),
                        hl_colored(&expected)
                    );
                    elems.push(elem);
                }
            }
            "T0031" => {
                // Some of these carry trailing "the proviso was implied
                // by..." clarifications; the unanchored match skips them.
                if let Some(caps) = t0031_re().captures(&body.clone()) {
                    let typeclass = caps[1].to_string();
                    let ty = caps[2].to_string();
                    match typeclass.as_str() {
                        "Arith" => {
                            body = format!(
                                "type {} does not support arithmetic operations",
                                hl_colored(&ty)
                            );
                        }
                        "Ord" => {
                            body = format!(
                                "type {} does not support comparison operations",
                                hl_colored(&ty)
                            );
                        }
                        "Literal" => {
                            body =
                                format!("cannot convert literal to type {}", hl_colored(&ty));
                        }
                        _ => {}
                    }
                }
            }
            "T0003" => {
                // Usually a mistyped literal, but unbound constructor is
                // general enough that the translation stays general too.
                body = body.replace("unbound constructor", "undefined literal, type, or module");
            }
            "T0004" => {
                body = body.replace("unbound variable", "undefined variable or function");
            }
            "T0007" => {
                body = body.replace("unbound type constructor", "undefined type or module");
            }
            "G0005" => {
                if let Some(caps) = g0005_re().captures(&unprocessed_body) {
                    body = format!(
                        "rules {} and {} conflict and cannot both fire every cycle \
                         (e.g., they both try to set the same input of a shared module)",
                        error_colored(&caps[1]),
                        error_colored(&caps[2])
                    );
                }
            }
            _ => {}
        }

        let ctx = elems
            .iter()
            .find_map(|elem| sm.find_exact(line, col, elem))
            .or_else(|| sm.find(line, col));
        let snippet = ctx
            .map(|node| context_str(db, node, &[node]))
            .unwrap_or_default();

        let header = if is_error {
            error_colored("error:")
        } else {
            warn_colored("warning:")
        };
        let full = format!("{} {} {}\n{}", hl_colored(&format!("{loc}:")), header, body, snippet);
        let anchor = sm.find(line, col);
        let breadcrumbs = sm.context_info(line, col);
        if is_error {
            reporter.error(full, &breadcrumbs, anchor);
        } else {
            reporter.warning(full, &breadcrumbs, anchor);
        }
    }
}
