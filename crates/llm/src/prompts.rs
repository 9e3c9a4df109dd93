use common::{MEDICINE_CATEGORIES, MEDICINE_FORMS};

/// Grounded research request for a medicine that is not in the catalog yet.
pub fn research_prompt(medicine_name: &str) -> String {
    format!(
        "Medicine Name: {medicine_name}\n\
         \n\
         Please provide the following details:\n\
         \n\
         1. Category: (select from: {categories})\n\
         2. Medicine Forms: (select from: {forms})\n\
         3. Quantity per Pack: (e.g., 60 ml Bottle, 10 Tablets, 1 Vial, etc.)\n\
         \n\
         Details to collect:\n\
         \n\
         - Cover Disease: (what the medicine helps to treat or recover from)\n\
         - Symptoms: (when this medicine can be taken)\n\
         - Side Effects: (possible adverse effects)\n\
         - Instructions: (how to take/use the medicine correctly)\n\
         - Description in Hinglish: (short, 1-line description)\n",
        categories = MEDICINE_CATEGORIES.join(", "),
        forms = MEDICINE_FORMS.join(", "),
    )
}

/// Strict-JSON extraction over free research text.
pub fn extraction_prompt(batch_id: &str, medicine_name: &str, raw_text: &str) -> String {
    format!(
        r#"You are a data extraction assistant. Provide ONLY valid JSON output, no Markdown, no extra text, no explanations.

Input:
Batch_no: "{batch_id}"
Medicine name: "{medicine_name}"
Raw text: "{raw_text}"

Output format (strict JSON):
{{
  "Batch_ID": "<batch_id>",
  "Name of Medicine": "<value>",
  "Category": "<select 1 value from: {categories}>",
  "Medicine Forms": "<select 1 value from: {forms}>",
  "Quantity_per_pack": "<example: 60 ml Bottle, 10 Tablets, 1 Vial>",
  "Cover Disease": "<3-4 keywords, comma-separated>",
  "Symptoms": "<3-4 keywords, comma-separated>",
  "Side Effects": "<3-4 keywords, comma-separated>",
  "Instructions": "<full phrase>",
  "Description in Hinglish": "<full phrase>"
}}

Rules:
- Do NOT modify Batch_no.
- Provide 3-4 concise keywords for Cover Disease, Symptoms, and Side Effects.
- Provide full phrases for Instructions and Description in Hinglish.
- Return ONE JSON object.
"#,
        categories = MEDICINE_CATEGORIES.join(", "),
        forms = MEDICINE_FORMS.join(", "),
    )
}

/// Symptom advisor prompt. `records_json` is the serialized candidate list
/// the model is allowed to choose from.
pub fn advisor_prompt(query: &str, records_json: &str) -> String {
    format!(
        r#"You are a medical assistant AI. You will ONLY use the provided medicine records to answer.
Do not invent new medicines outside the given records.

Medicine_data: {records_json}
Patient Query: {query}

1. Detect the problem from the patient query.
2. Select ONLY relevant medicines from the given data that match the detected problem.
3. If multiple medicines serve the same purpose, select only one (the most suitable based on dosage, availability, or relevance).
4. If no medicine is related to the detected problem, return an empty "Medicines" list and note "No medicine found for this query."

Return the result STRICTLY as one valid JSON object with no text outside it:
{{"AI Response": "This person has <detected problem> issue",
  "Medicines": [
    {{"S.no": 1, "Name": "<name>", "Batch No.": "<batch id>", "Price_INR": <price>, "Quantity_per_pack": "<pack size>", "Description": "<1-line purpose>", "Instructions": "<dosage + one-line prescription>"}}
  ],
  "Score": "<confidence>%",
  "overall instructions": "<2-3 lines of friendly lifestyle, exercise and prevention advice>"
}}
"#
    )
}
