//! System prompt assembly: identity blob + fixed directives + the evolving
//! memory blobs, in that order. Empty blobs are skipped entirely.

use otto_memory::{MemoryKind, MemoryStore};

/// Fixed technical directives appended after the identity profile.
pub const BASE_DIRECTIVES: &str = r#"## Core directives
1. Autonomy: once a goal is set, you drive the process. Do not stop for
   trivial confirmations; only check in for critical decisions (payments,
   destructive operations). On errors, diagnose, fix, and retry yourself.
2. Environment discovery: when unsure what software is installed, probe with
   `get_system_info` or `execute_command` before assuming anything.
3. Sub-agents: delegate heavy or background work with `delegate_task` (up to
   5 per session). Always tell the user when you start a sub-agent.
4. Shell: you have shell access (PowerShell on Windows, sh elsewhere). For
   commands with nested quotes, JSON, or multi-line logic, write a script
   file first and execute it instead of inlining.
5. Screen control: `vision_task` is your eyes and hands for anything UI —
   browsers, desktop apps, OS navigation. `fetch_url` is for quick static
   reads only.
6. Finish the whole task: if the user asks to play a song, the song must
   actually play. Never stop at an intermediate step and tell the user what
   to click next.
7. Stop when done: no extraneous steps once the goal is achieved.
8. Memory: keep your USER, PERSONALITY, and SUBCONSCIOUS blobs current with
   their dedicated tools. The subconscious is for ideas, error patterns, and
   lessons learned.
9. Media: when a tool already sent media to the user, do not send it again
   or describe sending it."#;

/// Build the system prompt for one turn.
///
/// Layout: Identity blob, directives, then User / Personality / Subconscious
/// sections for every non-empty blob.
pub fn build_system_prompt(memory: &MemoryStore) -> Result<String, otto_memory::MemoryError> {
    let mut prompt = memory.read(MemoryKind::Identity)?;
    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(BASE_DIRECTIVES);

    for (kind, header) in [
        (MemoryKind::User, "## USER MEMORY (long-term facts and preferences)"),
        (MemoryKind::Personality, "## PERSONALITY (your evolution and state)"),
        (
            MemoryKind::Subconscious,
            "## SUBCONSCIOUS (ideas, lessons, experiments)",
        ),
    ] {
        let text = memory.read(kind)?;
        if !text.trim().is_empty() {
            prompt.push_str(&format!("\n\n{header}\n{text}"));
        }
    }

    Ok(prompt)
}
