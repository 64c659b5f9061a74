pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGVIEW CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logview/config.yml
#   3. /etc/logview/config.yml
#
# Every section and field is optional. Values may reference environment
# variables with $env{NAME}.

# -----------------------------------------------------------------------------
# SERVER
# -----------------------------------------------------------------------------
server:
  # Base URL of the log server (a path prefix is kept)
  base_url: http://localhost:8080
  # Connect timeout for streams, total timeout for history requests
  timeout: 30s
  # First reconnect delay after a dropped stream (doubles up to 60s)
  retry_interval: 1s
  # Treat a silent stream as broken after this long, or 'infinite'
  idle_timeout: infinite

# -----------------------------------------------------------------------------
# VIEWER
# -----------------------------------------------------------------------------
viewer:
  # Maximum number of entries kept visible
  max_logs: 600
  # Flush pending entries after this much quiet time...
  debounce: 250ms
  # ...but never later than this after the first pending entry
  max_wait: 1s

# -----------------------------------------------------------------------------
# BACKFILL
# -----------------------------------------------------------------------------
backfill:
  # Oldest visible entries used to size the look-back window
  sample_size: 300
  # Look-back window when fewer entries are visible
  fallback_window: 10m
  # Minimum entries requested per container when loading older logs
  min_entries: 100
  # Entries requested from each end of a skipped range
  skipped_page: 100

# -----------------------------------------------------------------------------
# STREAM
# -----------------------------------------------------------------------------
stream:
  stdout: true
  stderr: true
  # Restrict to these levels (fatal, error, warn, info, debug, trace, unknown)
  levels: []
"#
    .to_string()
}
