//! Reserved-word sets for identifier hygiene.
//!
//! MS identifiers are rejected when they collide with the surface-Verilog
//! family's reserved words (the backend checks against those itself, with
//! unhelpful messages) or with the backend HDL's own keywords (which would
//! produce truly inscrutable errors downstream). Both arrays are sorted so
//! membership is a binary search.

/// SystemVerilog reserved words.
static SV_KEYWORDS: &[&str] = &[
    "alias", "always", "always_comb", "always_ff", "always_latch", "and", "assert",
    "assert_strobe", "assign", "assume", "automatic", "before", "begin", "bind", "bins",
    "binsof", "break", "buf", "bufif0", "bufif1", "byte", "case", "casex", "casez", "cell",
    "chandle", "class", "clocking", "cmos", "config", "const", "constraint", "context",
    "continue", "cover", "covergroup", "coverpoint", "cross", "deassign", "default",
    "defparam", "design", "disable", "dist", "do", "edge", "else", "end", "endcase",
    "endclass", "endclocking", "endconfig", "endfunction", "endgenerate", "endgroup",
    "endinterface", "endmodule", "endpackage", "endprimitive", "endprogram", "endproperty",
    "endsequence", "endspecify", "endtable", "endtask", "enum", "event", "expect", "export",
    "extends", "extern", "final", "first_match", "for", "force", "foreach", "forever",
    "fork", "forkjoin", "function", "generate", "genvar", "highz0", "highz1", "if", "iff",
    "ifnone", "ignore_bins", "illegal_bins", "import", "incdir", "include", "initial",
    "inout", "input", "inside", "instance", "int", "integer", "interface", "intersect",
    "join", "join_any", "join_none", "large", "liblist", "library", "local", "localparam",
    "logic", "longint", "macromodule", "matches", "medium", "modport", "module", "nand",
    "negedge", "new", "nmos", "nor", "noshowcancelled", "not", "notif0", "notif1", "null",
    "or", "output", "package", "packed", "parameter", "pmos", "posedge", "primitive",
    "priority", "program", "property", "protected", "pull0", "pull1", "pulldown", "pullup",
    "pulsestyle_ondetect", "pulsestyle_onevent", "pure", "rand", "randc", "randcase",
    "randsequence", "rcmos", "real", "realtime", "ref", "reg", "release", "repeat",
    "return", "rnmos", "rpmos", "rtran", "rtranif0", "rtranif1", "scalared", "sequence",
    "shortint", "shortreal", "showcancelled", "signed", "small", "solve", "specify",
    "specparam", "static", "string", "strong0", "strong1", "struct", "super", "supply0",
    "supply1", "table", "tagged", "task", "this", "throughout", "time", "timeprecision",
    "timeunit", "tran", "tranif0", "tranif1", "tri", "tri0", "tri1", "triand", "trior",
    "trireg", "type", "typedef", "union", "unique", "unsigned", "use", "var", "vectored",
    "virtual", "void", "wait", "wait_order", "wand", "weak0", "weak1", "while", "wildcard",
    "wire", "with", "within", "wor", "xnor", "xor",
];

/// Backend-HDL keywords not already in the SystemVerilog set.
static BSV_KEYWORDS: &[&str] = &[
    "action", "actionvalue", "ancestor", "clock", "clocked_by", "default_clock",
    "default_reset", "deriving", "endaction", "endactionvalue", "endinstance", "endmethod",
    "endpar", "endrule", "endrules", "endseq", "endtypeclass", "input_clock", "input_reset",
    "let", "match", "method", "no_reset", "noreset", "output_clock", "output_reset", "par",
    "powered_by", "provisos", "reset", "reset_by", "rule", "rules", "same_family",
    "schedule", "seq", "typeclass", "valueOf", "valueof",
];

/// Returns `true` if `s` is a SystemVerilog reserved word.
pub fn is_sv_keyword(s: &str) -> bool {
    SV_KEYWORDS.binary_search(&s).is_ok()
}

/// Returns `true` if `s` is a backend-HDL keyword.
pub fn is_bsv_keyword(s: &str) -> bool {
    BSV_KEYWORDS.binary_search(&s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_are_sorted() {
        for w in SV_KEYWORDS.windows(2) {
            assert!(w[0] < w[1], "SV_KEYWORDS out of order: {} >= {}", w[0], w[1]);
        }
        for w in BSV_KEYWORDS.windows(2) {
            assert!(w[0] < w[1], "BSV_KEYWORDS out of order: {} >= {}", w[0], w[1]);
        }
    }

    #[test]
    fn sv_membership() {
        assert!(is_sv_keyword("always"));
        assert!(is_sv_keyword("wire"));
        assert!(is_sv_keyword("xor"));
        assert!(!is_sv_keyword("counter"));
    }

    #[test]
    fn bsv_membership() {
        assert!(is_bsv_keyword("deriving"));
        assert!(is_bsv_keyword("valueOf"));
        assert!(is_bsv_keyword("provisos"));
        assert!(!is_bsv_keyword("shift"));
    }
}
