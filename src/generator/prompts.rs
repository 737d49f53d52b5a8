use crate::config::ApplicantProfile;
use crate::models::Contact;

pub fn company_or_default(contact: &Contact) -> &str {
    contact
        .company
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or("your company")
}

pub fn title_or_default(contact: &Contact) -> &str {
    contact
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("HR Manager")
}

pub fn default_subject(profile: &ApplicantProfile, company: &str) -> String {
    format!("Application for {} Role - {company}", profile.role)
}

/// Name followed by whichever contact lines are configured.
pub fn signature(profile: &ApplicantProfile) -> String {
    let mut lines = Vec::new();
    if !profile.name.is_empty() {
        lines.push(profile.name.clone());
    }
    if let Some(phone) = &profile.phone {
        lines.push(format!("Phone: {phone}"));
    }
    if let Some(linkedin) = &profile.linkedin {
        lines.push(format!("LinkedIn: {linkedin}"));
    }
    if let Some(github) = &profile.github {
        lines.push(format!("GitHub: {github}"));
    }
    lines.join("\n")
}

pub fn template_body(profile: &ApplicantProfile, contact: &Contact) -> String {
    let company = company_or_default(contact);
    let introduction = if profile.name.is_empty() {
        format!("I am a {}", profile.role)
    } else {
        format!("My name is {}, and I am a {}", profile.name, profile.role)
    };
    let skills = profile
        .skills
        .as_deref()
        .map(|s| format!(" My core skills include {s}."))
        .unwrap_or_default();

    format!(
        "Hello,\n\n\
         {introduction} with hands-on experience building and maintaining real-world software.{skills}\n\n\
         I enjoy learning quickly, solving problems and delivering clean, reliable solutions, and I \
         believe I would be a good fit for opportunities at {company}.\n\n\
         Please find my resume attached for your reference.\n\n\
         Thank you for your time and consideration.\n\n\
         Best regards,\n{}",
        signature(profile)
    )
}

pub fn draft_prompt(profile: &ApplicantProfile, contact: &Contact) -> String {
    let company = company_or_default(contact);
    let mut background = String::new();
    for (label, value) in [
        ("Skills", &profile.skills),
        ("Experience", &profile.experience),
        ("Education", &profile.education),
        ("Highlights", &profile.highlights),
    ] {
        if let Some(value) = value {
            background.push_str(&format!("{label}: {value}\n"));
        }
    }

    format!(
        "Write a short, direct job application email.\n\n\
         RECIPIENT: {recipient} ({title}) at {company}\n\
         APPLICANT: {applicant}, applying for a {role} role\n\
         {background}\n\
         Use this template and adapt it lightly to the company:\n\
         ---\n{template}\n---\n\n\
         Rules:\n\
         - Stay close to the template; at most one short phrase about what {company} does\n\
         - No exaggerations or fancy wording\n\
         - Under 120 words, plain text, professional\n\n\
         Reply in exactly this format:\n\
         SUBJECT: {subject}\n\
         BODY:\n\
         <email body ending with the signature below>\n\n\
         Signature:\n{signature}\n",
        recipient = contact.name,
        title = title_or_default(contact),
        applicant = if profile.name.is_empty() { "the applicant" } else { profile.name.as_str() },
        role = profile.role,
        template = template_body(profile, contact),
        subject = default_subject(profile, company),
        signature = signature(profile),
    )
}
