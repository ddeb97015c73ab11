//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    // Header
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Whole chain, so context layers are matched too
    let error_msg = format!("{:#}", error);

    if error_msg.contains("loader") {
        format_loader_error(&mut output);
    } else if error_msg.contains("adapter") || error_msg.contains("Adapter") {
        format_adapter_error(&mut output);
    } else if error_msg.contains("fixture") {
        format_fixture_error(&mut output);
    } else if error_msg.contains("rate control") || error_msg.contains("encoder unavailable") {
        format_job_error(&mut output, &error_msg);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else {
        format_generic_error(&mut output, &error_msg);
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    // Footer with help
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-qsv-info -vvv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Inspect adapters as JSON: lamco-qsv-info --format json"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_loader_error(output: &mut String) {
    writeln!(output, "Quick Sync Runtime Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not load the Intel media runtime.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Runtime not installed").ok();
    writeln!(output, "     → Install libvpl and the Intel media driver").ok();
    writeln!(
        output,
        "     → Debian/Ubuntu: sudo apt install libvpl2 intel-media-va-driver-non-free"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Testing without hardware").ok();
    writeln!(
        output,
        "     → Use a scripted runtime: lamco-qsv-info --runtime fixtures/dual-adapter.toml"
    )
    .ok();
}

fn format_adapter_error(output: &mut String) {
    writeln!(output, "Adapter Error").ok();
    writeln!(output).ok();
    writeln!(output, "No usable Quick Sync adapter was found.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. No Intel GPU in this machine").ok();
    writeln!(output, "     → Check: lspci | grep -i vga").ok();
    writeln!(output).ok();
    writeln!(output, "  2. No permission to access render nodes").ok();
    writeln!(output, "     → Check: ls -l /dev/dri/renderD*").ok();
    writeln!(
        output,
        "     → Add your user to render group: sudo usermod -aG render $USER"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  3. Wrong adapter index").ok();
    writeln!(output, "     → Omit --gpu to use the default adapter").ok();
}

fn format_fixture_error(output: &mut String) {
    writeln!(output, "Runtime Fixture Error").ok();
    writeln!(output).ok();
    writeln!(output, "The scripted runtime fixture could not be used.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. File not found").ok();
    writeln!(output, "     → Check the path given to --runtime").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Unknown platform or feature name").ok();
    writeln!(output, "     → See fixtures/ for valid examples").ok();
}

fn format_job_error(output: &mut String, error: &str) {
    writeln!(output, "Encode Job Error").ok();
    writeln!(output).ok();
    writeln!(output, "The encode job could not be resolved.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Give a rate control target").ok();
    writeln!(output, "     → --quality 23 or --bitrate 6000").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Pick an encoder the adapter supports").ok();
    writeln!(output, "     → Run without --encoder to list encoders").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Default location: ~/.config/lamco-qsv/config.toml"
    )
    .ok();
    writeln!(
        output,
        "     → Or specify: lamco-qsv-info -c /path/to/config.toml"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Invalid values").ok();
    writeln!(
        output,
        "     → preset: speed, balanced or quality; log format: pretty, compact or json"
    )
    .ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Error").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Rerun with -vvv and check the probe log").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::DiscoveryError;

    #[test]
    fn test_format_user_error() {
        let error = anyhow::Error::new(DiscoveryError::LoaderUnavailable {
            reason: "libvpl.so.2 not found".to_string(),
        });
        let formatted = format_user_error(&error);
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("Quick Sync Runtime Error"));
        assert!(formatted.contains("libvpl.so.2"));
    }

    #[test]
    fn test_loader_hint_names_shipped_fixture() {
        let error = anyhow::Error::new(DiscoveryError::LoaderUnavailable {
            reason: "no runtime".to_string(),
        });
        let formatted = format_user_error(&error);
        let fixture = formatted
            .split("--runtime ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap();
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(fixture);
        assert!(path.is_file(), "{} does not exist", path.display());
    }

    #[test]
    fn test_context_chain_is_matched() {
        let error = anyhow::anyhow!("unknown platform \"foo\"")
            .context("Invalid runtime fixture: x.toml");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Runtime Fixture Error"));
    }

    #[test]
    fn test_config_error_formatting() {
        let error = anyhow::anyhow!("Failed to parse config file");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Configuration Error"));
    }
}
