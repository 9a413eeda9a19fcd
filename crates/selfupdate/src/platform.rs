//! Runtime platform descriptor and locator templating.
//!
//! A base locator such as `https://example.com/myapp-{OS}-{Arch}{Ext}` is
//! materialised into `https://example.com/myapp-windows-x86_64.exe` on
//! Windows and `https://example.com/myapp-linux-x86_64` on Linux.

use std::path::Path;

/// Describes the platform the running executable was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// OS identifier as reported by `std::env::consts::OS` (`linux`, `macos`, `windows`, ...).
    pub os: String,
    /// Architecture identifier (`x86_64`, `aarch64`, ...).
    pub arch: String,
    /// Executable suffix including the dot, empty where executables have none.
    pub ext: String,
    /// Executable file name without the suffix.
    pub executable: String,
}

/// Failure to materialise a templated locator.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
}

impl Platform {
    /// Build a descriptor from explicit values.
    pub fn new(
        os: impl Into<String>,
        arch: impl Into<String>,
        ext: impl Into<String>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            ext: ext.into(),
            executable: executable.into(),
        }
    }

    /// Derive the descriptor for the running process.
    pub fn current() -> Self {
        let executable = std::env::current_exe()
            .ok()
            .and_then(|path| executable_name(&path))
            .or_else(|| {
                std::env::args_os()
                    .next()
                    .and_then(|arg0| executable_name(Path::new(&arg0)))
            })
            .unwrap_or_default();

        Self::new(
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::EXE_SUFFIX,
            executable,
        )
    }

    /// Substitute `{OS}`, `{Arch}`, `{Ext}` and `{Executable}` in `template`.
    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or(TemplateError::Unterminated(offset + start))?;
            let value = match &after[..end] {
                "OS" => &self.os,
                "Arch" => &self.arch,
                "Ext" => &self.ext,
                "Executable" => &self.executable,
                other => return Err(TemplateError::UnknownPlaceholder(other.to_string())),
            };
            out.push_str(value);
            let consumed = start + 1 + end + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Like [`render`](Self::render) but falls back to the literal template.
    pub fn expand(&self, template: &str) -> String {
        match self.render(template) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::debug!(template, %err, "using locator template verbatim");
                template.to_string()
            }
        }
    }
}

/// Identifier for `os` in the spelling of `std::env::consts::OS`.
///
/// Manifests written for Go tooling say `darwin` where Rust says `macos`.
pub fn canonical_os(os: &str) -> &str {
    match os {
        "darwin" => "macos",
        other => other,
    }
}

/// Identifier for `arch` in the spelling of `std::env::consts::ARCH`.
pub fn canonical_arch(arch: &str) -> &str {
    match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        "386" => "x86",
        other => other,
    }
}

fn executable_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let suffix = std::env::consts::EXE_SUFFIX;
    match name.strip_suffix(suffix) {
        Some(stem) if !suffix.is_empty() => Some(stem.to_string()),
        _ => Some(name),
    }
}
