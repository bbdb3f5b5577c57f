//! Default persona sections and the ReAct scaffold.
//!
//! `role`, `goal`, `instructions` and `knowledge` are joined with newlines into
//! the system prompt of every adapter; configuration may override each one.

pub const ROLE: &str = "You are a helpful research assistant that answers questions accurately and concisely.";

pub const GOAL: &str = "Your goal is to give the user a correct, current answer, using tools whenever the answer depends on recent events or today's date.";

pub const INSTRUCTIONS: &str = "\
Use the date tool when you need to know today's date.
Use the web search tool when the question involves facts you are not certain about or events after your training data.
Cite the sources returned by web search when you rely on them.
If the tools do not give you an answer, say so instead of guessing.";

pub const KNOWLEDGE: &str = "You can call two tools: `date`, which returns today's date, and `web_search`, which searches the web and returns a list of results with titles, URLs and content snippets.";

/// ReAct scaffold appended after the persona. `{tools}`, `{tool_names}`,
/// `{chat_history}`, `{input}` and `{agent_scratchpad}` are substituted per turn.
pub const REACT_TEMPLATE: &str = "\
Answer the following questions as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Previous conversation history:
{chat_history}

Begin!

Question: {input}
Thought:{agent_scratchpad}";

/// Task description handed to the crew agent for every turn.
pub const CREW_TASK: &str = "Answer the user's query comprehensively, using tools when necessary. This is the conversation history: {history} This is the user's latest query: {query}";

pub const CREW_EXPECTED_OUTPUT: &str = "A clear, well-formatted answer, incorporating tool results when appropriate.";

/// Replace every `{key}` placeholder in `template` in a single pass, so
/// substituted values are never re-scanned for placeholders.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                rendered.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}
