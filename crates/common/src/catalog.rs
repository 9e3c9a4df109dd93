use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder written for attributes the extraction service could not fill.
pub const NOT_FOUND: &str = "not_found";

pub const MEDICINE_FORMS: &[&str] = &[
    "Suspension",
    "Effervescent Tablet",
    "Tablet",
    "Injection",
    "Capsule",
    "Cream",
    "Eye Drops",
    "Nasal Spray",
    "Syrup",
    "Inhaler",
    "Nebulizer Solution",
    "Ointment",
    "Sublingual Tablet",
    "Nasal Drops",
    "Transdermal Patch",
    "Enteric Coated Tablet",
    "Powder",
    "Chewable Tablet",
    "Solution",
    "Gel",
    "Spray",
    "Oral + Injection",
    "Implant + IUD",
    "Ear Drops",
    "Powder + Tablet",
    "Oral Drops",
    "Liquid",
    "Intrauterine Device",
    "Juice",
    "Mouthwash",
    "Ring + Patch",
    "Subdermal Implant",
    "Sachet",
    "Vaginal Ring",
    "Paste",
    "Patch",
    "Gum",
    "Transfusion",
    "Oral",
    "Inhalation",
    "Oral Suspension",
    "Lozenge",
    "IV",
    "Gel Patch",
    "IV Solution",
    "IV Additive",
    "Lotion",
];

pub const MEDICINE_CATEGORIES: &[&str] = &[
    "Antipyretics",
    "Analgesics",
    "Antivirals",
    "Antibiotics",
    "Antifungals",
    "Antimalarials",
    "Anthelmintics",
    "Antihistamines",
    "Decongestants",
    "Cough Suppressants",
    "Expectorants",
    "Bronchodilators",
    "Corticosteroids",
    "Immunosuppressants",
    "Anticoagulants",
    "Antiplatelets",
    "Thrombolytics",
    "Antihypertensives",
    "Beta-blockers",
    "ACE Inhibitors",
    "ARBs",
    "Calcium Channel Blockers",
    "Diuretics",
    "Antiarrhythmics",
    "Antianginals",
    "Lipid-lowering Drugs (Statins)",
    "Antidiabetics (Oral)",
    "Insulin",
    "Antacids",
    "Proton Pump Inhibitors",
    "H2 Receptor Blockers",
    "Laxatives",
    "Antidiarrheals",
    "Anti-emetics",
    "Antispasmodics",
    "Antiulcer Agents",
    "Antiseptics",
    "Vaccines",
    "Hormonal Contraceptives",
    "Eye Drops (Lubricant)",
    "Ear Drops (Antifungal)",
    "Nasal Sprays (Decongestant)",
    "Nasal Sprays (Steroid)",
    "Oral Rehydration Salts",
    "Nutritional Supplements",
    "Vitamins",
    "Minerals",
    "Multivitamins",
    "Herbal Medicines",
    "Ayurvedic Medicines",
    "Immunotherapy Agents",
    "Biologics",
    "DMARDs",
    "Disinfectants",
    "Thyroid Medications",
    "Corticosteroid Creams",
    "Topical Antibiotics",
    "Homeopathic Remedies",
    "Antineoplastics (Chemotherapy)",
    "Anti-Gout Medications",
    "Anti-Osteoporosis Drugs",
    "Topical Antifungals",
    "Ear Drops (Antibiotic)",
    "Anti-thyroid Drugs",
    "Eye Drops (Antibiotic)",
    "Ear Drops (Analgesic)",
    "Eye Drops (Antihistamine)",
    "Monoclonal Antibodies",
    "Muscle Relaxants",
    "Antipsychotics",
    "Antidepressants",
    "Anxiolytics",
    "Mood Stabilizers",
    "Cognitive Enhancers (Nootropics)",
    "Stimulants",
    "Smoking Cessation Aids",
    "Antivertigo Drugs",
    "Anti-Motion Sickness Drugs",
    "Anti-Allergic Drugs",
    "Immunomodulators",
    "Blood Products",
    "Antidotes",
    "Local Anesthetics",
    "General Anesthetics",
    "Pain Patches",
    "Combination Drugs (Multi-Action)",
    "Analgesics & Pain Relief",
    "Antacids & Acid Reducers",
    "Multivitamins & Supplements",
    "Antidiabetics",
    "Digestive & Laxatives",
    "Anti-Parkinson Drugs",
    "Antiepileptics",
    "Hypnotics",
    "Sedatives",
    "Weight Loss Medications",
    "Antioxidants",
    "Chelating Agents",
    "Radiopharmaceuticals",
    "Topical Anesthetics",
    "Cough & Cold Medicines",
    "Blood Pressure / Hypertension Medicines",
    "Contrast Agents (Imaging)",
    "Antihistamines & Allergy Medicines",
    "Appetite Stimulants",
    "Electrolyte Replacements",
];

/// One medicine SKU as held in the catalog snapshot.
///
/// Snapshot rows may use either these field names or the spreadsheet column
/// headers (`Batch_ID`, `Name of Medicine`, ...). Missing or null values fall
/// back to empty strings and zeros so every record has the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MedicineRecord {
    #[serde(alias = "Batch_ID", deserialize_with = "lenient_text")]
    pub batch_id: String,
    #[serde(alias = "Name of Medicine", deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(alias = "Category", deserialize_with = "lenient_text")]
    pub category: String,
    #[serde(alias = "Medicine Forms", deserialize_with = "lenient_text")]
    pub form: String,
    #[serde(alias = "Price_INR", deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(alias = "Quantity_per_pack", deserialize_with = "lenient_text")]
    pub quantity_per_pack: String,
    #[serde(alias = "Total_Quantity", deserialize_with = "lenient_quantity")]
    pub total_quantity: u64,
    #[serde(alias = "Cover Disease", deserialize_with = "lenient_text")]
    pub cover_disease: String,
    #[serde(alias = "Symptoms", deserialize_with = "lenient_text")]
    pub symptoms: String,
    #[serde(alias = "Side Effects", deserialize_with = "lenient_text")]
    pub side_effects: String,
    #[serde(alias = "Instructions", deserialize_with = "lenient_text")]
    pub instructions: String,
    #[serde(alias = "Description in Hinglish", deserialize_with = "lenient_text")]
    pub description: String,
}

impl MedicineRecord {
    pub fn has_known_form(&self) -> bool {
        self.form == NOT_FOUND || MEDICINE_FORMS.contains(&self.form.as_str())
    }

    pub fn has_known_category(&self) -> bool {
        self.category == NOT_FOUND || MEDICINE_CATEGORIES.contains(&self.category.as_str())
    }
}

/// Textual columns the lexical matcher may compare a query against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchableField {
    BatchId,
    Name,
    Category,
    CoverDisease,
    Symptoms,
    SideEffects,
    Instructions,
    Description,
}

impl SearchableField {
    pub const DEFAULTS: [Self; 8] = [
        Self::BatchId,
        Self::Name,
        Self::Category,
        Self::CoverDisease,
        Self::Symptoms,
        Self::SideEffects,
        Self::Instructions,
        Self::Description,
    ];

    pub fn value(self, record: &MedicineRecord) -> &str {
        match self {
            Self::BatchId => &record.batch_id,
            Self::Name => &record.name,
            Self::Category => &record.category,
            Self::CoverDisease => &record.cover_disease,
            Self::Symptoms => &record.symptoms,
            Self::SideEffects => &record.side_effects,
            Self::Instructions => &record.instructions,
            Self::Description => &record.description,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        None => String::new(),
        Some(Loose::Int(v)) => v.to_string(),
        Some(Loose::Signed(v)) => v.to_string(),
        Some(Loose::Float(v)) => v.to_string(),
        Some(Loose::Text(v)) => v,
        Some(Loose::Flag(v)) => v.to_string(),
    })
}

#[allow(clippy::cast_precision_loss)]
fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(v)) => v as f64,
        Some(Loose::Signed(v)) => v as f64,
        Some(Loose::Float(v)) if v.is_finite() => v,
        Some(Loose::Text(v)) => v.trim().parse::<f64>().ok().filter(|p| p.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(v)) => v,
        Some(Loose::Float(v)) if v.is_finite() && v > 0.0 => v.round() as u64,
        Some(Loose::Text(v)) => v.trim().parse::<f64>().map_or(0, |q| {
            if q.is_finite() && q > 0.0 { q.round() as u64 } else { 0 }
        }),
        _ => 0,
    })
}
