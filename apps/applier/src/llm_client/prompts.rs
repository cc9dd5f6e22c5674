// Prompt constants for outreach generation.
// Both strategies share the same voice; only the retrieval strategy embeds the
// resume context into the prompt itself.

/// Name given to assistants created on startup.
pub const ASSISTANT_NAME: &str = "Job Outreach Writer";

/// Instructions for assistants created on startup (direct strategy).
pub const ASSISTANT_INSTRUCTIONS: &str = "\
    You play the role of a job seeker. Each user message is a job description. \
    Reply with a single polite and professional application message to the recruiter, \
    combining the applicant's experience and skills with the job's requirements to \
    highlight the applicant's strengths. Reply with the message only: no preamble, \
    no explanation, no headings.";

/// Fixed retrieval query. The retrieved resume chunks are matched against it,
/// not against the job description.
pub const RETRIEVAL_QUESTION: &str = "Based on the job description, what are the most \
    suitable skills in the resume? What are the applicant's strengths?";

/// Retrieval-augmented letter template.
/// Replace: {character_limit}, {job_description}, {context}, {question}
pub const LETTER_PROMPT_TEMPLATE: &str = r#"You will play the role of a job seeker. Based on the resume content in context and the job description, directly write a polite and professional job application message to HR. The message should be strictly limited to {character_limit} characters, using professional language to combine the experiences and skills from the resume with the job description to highlight the applicant's strengths and maximize the chance of impressing the recruiter. Always write the message in English, starting with 'Dear Hiring Manager' and ending with the applicant's contact information. This is a job application message and should not contain anything outside of the application content, such as 'Based on your job requirements and personal resume, I will help you draft a job application email:', to allow for direct automated copy-paste sending.
Job Description
{job_description}
Resume Content:
{context}
Requirements:
{question}"#;

/// Fills the letter template. The job description is substituted last so that
/// braces inside it are never treated as placeholders.
pub fn build_letter_prompt(
    character_limit: usize,
    job_description: &str,
    context: &str,
) -> String {
    LETTER_PROMPT_TEMPLATE
        .replace("{character_limit}", &character_limit.to_string())
        .replace("{question}", RETRIEVAL_QUESTION)
        .replace("{context}", context)
        .replace("{job_description}", job_description)
}
