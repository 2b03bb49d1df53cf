/// System role for every analysis call.
pub const SYSTEM: &str = "You document unfamiliar codebases for engineers. \
Answer in Markdown and keep the diagram to exactly one fenced mermaid block.";

/// Instructions sent ahead of the source context.
pub const INSTRUCTIONS: &str = "\
You are a code analysis expert. Analyze the following Java Spring Boot codebase and produce:\n\
1. A summary of what the code does.\n\
2. A list of the main modules and their responsibilities.\n\
3. A Mermaid diagram of the high-level data flow between controllers, services and the database.\n\n\
Put the diagram in a single fenced code block tagged `mermaid` (```mermaid ... ```). \
Use valid Mermaid syntax only inside that block.";

/// Assemble the analysis prompt around an already bounded `context`.
pub fn analysis_prompt(context: &str) -> String {
    let mut out = String::with_capacity(INSTRUCTIONS.len() + context.len() + 16);
    out.push_str(INSTRUCTIONS);
    out.push_str("\n\nCode:\n");
    out.push_str(context);
    out.push('\n');
    out
}
