/// The write-only trace boundary.
///
/// After a handler has applied an instruction's effects it renders the
/// mnemonic and operands and hands the text here. The sink has no access to
/// architectural state and cannot influence execution.
pub trait TraceSink {
    fn record(&mut self, asm: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn record(&mut self, _asm: &str) {}
}

/// Buffers rendered instructions; used by the debugger front-end and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingTrace {
    lines: Vec<String>,
}

impl RecordingTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl TraceSink for RecordingTrace {
    fn record(&mut self, asm: &str) {
        self.lines.push(asm.to_owned());
    }
}
