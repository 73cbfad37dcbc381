//! Closed category sets for the categorical application fields.
//!
//! These are the values the request form offers and the training data uses.
//! The encoder does not depend on them: it learns its vocabulary from the
//! training rows. The synthetic generator samples from these lists.

/// Home ownership classes as they appear in the training data
pub const HOME_OWNERSHIP: &[&str] = &["norent_noown", "owned", "rented"];

/// Home ownership values of the request schema enumeration. They do not
/// overlap with [`HOME_OWNERSHIP`].
pub const LEGACY_HOME_OWNERSHIP: &[&str] = &["OWN", "RENT", "MORTGAGE"];

/// Car ownership flag
pub const CAR_OWNERSHIP: &[&str] = &["no", "yes"];

pub const PROFESSIONS: &[&str] = &[
    "Mechanical_engineer",
    "Software_Developer",
    "Technical_writer",
    "Civil_servant",
    "Librarian",
    "Economist",
    "Flight_attendant",
    "Architect",
    "Designer",
    "Physician",
    "Financial_Analyst",
    "Air_traffic_controller",
    "Politician",
    "Police_officer",
    "Artist",
    "Surveyor",
    "Design_Engineer",
    "Chemical_engineer",
    "Hotel_Manager",
    "Dentist",
    "Comedian",
    "Biomedical_Engineer",
    "Graphic_Designer",
    "Computer_hardware_engineer",
    "Petroleum_Engineer",
    "Secretary",
    "Computer_operator",
    "Chartered_Accountant",
    "Technician",
    "Microbiologist",
    "Fashion_Designer",
    "Aviator",
    "Psychologist",
    "Magistrate",
    "Lawyer",
    "Firefighter",
    "Engineer",
    "Official",
    "Analyst",
    "Geologist",
    "Drafter",
    "Statistician",
    "Web_designer",
    "Consultant",
    "Chef",
    "Army_officer",
    "Surgeon",
    "Scientist",
    "Civil_engineer",
    "Industrial_Engineer",
    "Technology_specialist",
];

pub const STATES: &[&str] = &[
    "madhya pradesh",
    "maharashtra",
    "kerala",
    "odisha",
    "tamil nadu",
    "gujarat",
    "rajasthan",
    "telangana",
    "bihar",
    "andhra pradesh",
    "west bengal",
    "haryana",
    "puducherry",
    "karnataka",
    "uttar pradesh",
    "himachal pradesh",
    "punjab",
    "tripura",
    "uttarakhand",
    "jharkhand",
    "mizoram",
    "assam",
    "jammu and kashmir",
    "delhi",
    "chhattisgarh",
    "chandigarh",
    "manipur",
    "sikkim",
];
