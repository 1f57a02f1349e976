//! Fixed instruction templates for the two math flows

/// Instructions for converting a natural-language question into a
/// Wolfram Language formula. The question itself is appended by the flow.
pub const FORMULA_INSTRUCTIONS: &str = "You are a mathematical expert. Convert the following mathematical question into a Wolfram Language formula.";

/// Instructions for producing a step-by-step solution. The problem (and the
/// formula, when one exists) are appended by the flow.
pub const SOLUTION_INSTRUCTIONS: &str = "You are an expert math tutor who specializes in providing step-by-step solutions to mathematical problems. Consider the user's question, and provide a detailed, step-by-step solution. If a Wolfram Language formula is provided, use it to guide your solution.";
