//! System templates shared by every tenant.
//!
//! Seeding is idempotent: a template is skipped when a system template with
//! the same name already exists.

use formcraft_core::validation::{validate_schema, validate_template};
use formcraft_core::{
    BusinessLogic, Cell, FieldOption, FieldType, FormField, FormSchema, FormTemplate, LayoutState,
    TemplateCategory, ValidationRules,
};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// Outcome of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Lays out fields row by row.
struct Builder {
    state: LayoutState,
}

impl Builder {
    fn new(logic: BusinessLogic) -> Self {
        Self {
            state: LayoutState::new(FormSchema::default().with_logic(logic)),
        }
    }

    /// One field on its own row.
    fn row(mut self, field: FormField) -> formcraft_core::Result<Self> {
        self.state.add_field(field, None)?;
        Ok(self)
    }

    /// Fields side by side in one row, one per column.
    fn columns(mut self, fields: Vec<FormField>) -> formcraft_core::Result<Self> {
        let row = self.state.row_count();
        self.state.insert_row(row, fields.len())?;
        for (column, field) in fields.into_iter().enumerate() {
            self.state.add_field(field, Some(Cell::new(row, column, 0)))?;
        }
        Ok(self)
    }

    fn finish(self, submit_label: &str) -> FormSchema {
        let mut schema = self.state.into_schema();
        schema.settings.submit_label = submit_label.to_string();
        schema
    }
}

fn text(name: &str, label: &str) -> FormField {
    FormField::new(FieldType::Text, name, label)
}

fn email() -> FormField {
    FormField::new(FieldType::Email, "email", "Email").required()
}

fn quiz_question(name: &str, label: &str, options: &[(&str, &str)], correct: &str) -> FormField {
    let mut field = FormField::new(FieldType::Radio, name, label).required().with_points(1);
    for (label, value) in options {
        let option = FieldOption::new(*label, *value);
        field = field.with_option(if *value == correct { option.correct() } else { option });
    }
    field
}

fn product(label: &str, value: &str, cents: i64) -> FieldOption {
    FieldOption::new(label, value).with_price(cents)
}

fn quick_poll() -> formcraft_core::Result<FormTemplate> {
    let logic = BusinessLogic::Poll { show_results: true };
    let schema = Builder::new(logic.clone())
        .row(
            FormField::new(FieldType::Radio, "choice", "What should we build next?")
                .required()
                .with_choices(&["Mobile app", "Dark mode", "Integrations", "Something else"]),
        )?
        .finish("Vote");
    Ok(FormTemplate::new(None, "Quick Poll", TemplateCategory::Poll, logic, schema)
        .with_description("A single question with live results."))
}

fn knowledge_quiz() -> formcraft_core::Result<FormTemplate> {
    let logic = BusinessLogic::Quiz {
        pass_score_percent: 70,
        show_correct_answers: true,
    };
    let schema = Builder::new(logic.clone())
        .row(FormField::new(FieldType::Heading, "intro", "Test your knowledge"))?
        .row(text("name", "Your name").required())?
        .row(quiz_question(
            "capital",
            "What is the capital of France?",
            &[("Berlin", "berlin"), ("Paris", "paris"), ("Madrid", "madrid")],
            "paris",
        ))?
        .row(quiz_question(
            "planet",
            "Which planet is closest to the sun?",
            &[("Venus", "venus"), ("Mercury", "mercury"), ("Mars", "mars")],
            "mercury",
        ))?
        .row(quiz_question(
            "boiling",
            "At sea level water boils at",
            &[("90 °C", "90"), ("100 °C", "100"), ("110 °C", "110")],
            "100",
        ))?
        .finish("Check answers");
    Ok(FormTemplate::new(None, "Knowledge Quiz", TemplateCategory::Quiz, logic, schema)
        .with_description("Scored multiple-choice questions with a pass mark."))
}

fn order_form() -> formcraft_core::Result<FormTemplate> {
    let logic = BusinessLogic::Ecommerce {
        currency: "USD".to_string(),
        tax_rate_bps: 825,
    };
    let products = FormField::new(FieldType::Product, "products", "Products")
        .required()
        .with_option(product("T-shirt", "tshirt", 1_999))
        .with_option(product("Mug", "mug", 1_250))
        .with_option(product("Sticker pack", "stickers", 499));
    let schema = Builder::new(logic.clone())
        .row(products)?
        .columns(vec![text("name", "Full name").required(), email()])?
        .row(FormField::new(FieldType::Textarea, "shipping_address", "Shipping address").required())?
        .row(FormField::new(FieldType::Textarea, "notes", "Order notes"))?
        .finish("Place order");
    Ok(FormTemplate::new(None, "Order Form", TemplateCategory::Ecommerce, logic, schema)
        .with_description("Priced products with quantities, tax, and totals."))
}

fn appointment_booking() -> formcraft_core::Result<FormTemplate> {
    let logic = BusinessLogic::Appointment {
        slot_minutes: 30,
        open_hour: 9,
        close_hour: 17,
    };
    let schema = Builder::new(logic.clone())
        .row(text("name", "Full name").required())?
        .columns(vec![email(), FormField::new(FieldType::Phone, "phone", "Phone")])?
        .columns(vec![
            FormField::new(FieldType::Date, "date", "Preferred date").required(),
            FormField::new(FieldType::Time, "time", "Preferred time").required(),
        ])?
        .row(FormField::new(FieldType::Textarea, "reason", "Reason for visit"))?
        .finish("Book");
    Ok(FormTemplate::new(None, "Appointment Booking", TemplateCategory::Appointment, logic, schema)
        .with_description("Half-hour slots between 9:00 and 17:00."))
}

fn customer_survey() -> formcraft_core::Result<FormTemplate> {
    let rating = FormField::new(FieldType::Rating, "satisfaction", "How satisfied are you overall?")
        .required()
        .with_validation(ValidationRules {
            required: true,
            min: Some(1.0),
            max: Some(5.0),
            ..Default::default()
        });
    let schema = Builder::new(BusinessLogic::None)
        .row(rating)?
        .row(
            FormField::new(FieldType::Radio, "frequency", "How often do you use our product?")
                .with_choices(&["Daily", "Weekly", "Monthly", "Rarely"]),
        )?
        .row(
            FormField::new(FieldType::Checkbox, "channels", "Where did you hear about us?")
                .with_choices(&["Search", "Social media", "Friend", "Advertisement"]),
        )?
        .row(FormField::new(FieldType::Textarea, "comments", "Anything else?"))?
        .finish("Send");
    Ok(FormTemplate::new(None, "Customer Survey", TemplateCategory::Survey, BusinessLogic::None, schema)
        .with_description("Satisfaction, usage, and open comments."))
}

fn event_registration() -> formcraft_core::Result<FormTemplate> {
    let schema = Builder::new(BusinessLogic::None)
        .columns(vec![
            text("first_name", "First name").required(),
            text("last_name", "Last name").required(),
        ])?
        .row(email())?
        .row(
            FormField::new(FieldType::Select, "ticket_type", "Ticket")
                .required()
                .with_choices(&["General", "VIP", "Student"]),
        )?
        .row(
            FormField::new(FieldType::Checkbox, "dietary", "Dietary requirements")
                .with_choices(&["Vegetarian", "Vegan", "Gluten free"]),
        )?
        .finish("Register");
    Ok(
        FormTemplate::new(None, "Event Registration", TemplateCategory::Registration, BusinessLogic::None, schema)
            .with_description("Attendee details and ticket choice."),
    )
}

fn contact_us() -> formcraft_core::Result<FormTemplate> {
    let schema = Builder::new(BusinessLogic::None)
        .columns(vec![text("name", "Name").required(), email()])?
        .row(
            FormField::new(FieldType::Select, "topic", "Topic")
                .with_choices(&["Sales", "Support", "Billing", "Other"]),
        )?
        .row(FormField::new(FieldType::Textarea, "message", "Message").required())?
        .finish("Send message");
    Ok(FormTemplate::new(None, "Contact Us", TemplateCategory::Contact, BusinessLogic::None, schema)
        .with_description("Name, email, and a message."))
}

fn product_feedback() -> formcraft_core::Result<FormTemplate> {
    let schema = Builder::new(BusinessLogic::None)
        .row(FormField::new(FieldType::Rating, "rating", "Rate the product").required())?
        .row(
            FormField::new(FieldType::Radio, "recommend", "Would you recommend it?")
                .with_choices(&["Yes", "Maybe", "No"]),
        )?
        .row(FormField::new(FieldType::Textarea, "improvements", "What could be better?"))?
        .finish("Send feedback");
    Ok(FormTemplate::new(None, "Product Feedback", TemplateCategory::Feedback, BusinessLogic::None, schema)
        .with_description("Star rating plus open feedback."))
}

/// The built-in templates, one per category.
pub fn system_templates() -> formcraft_core::Result<Vec<FormTemplate>> {
    Ok(vec![
        quick_poll()?,
        knowledge_quiz()?,
        order_form()?,
        appointment_booking()?,
        customer_survey()?,
        event_registration()?,
        contact_us()?,
        product_feedback()?,
    ])
}

/// Insert missing system templates.
pub async fn seed_system_templates<S: Store + ?Sized>(store: &S) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for template in system_templates()? {
        let check = validate_template(template.category, &template.business_logic, &template.schema);
        if !check.is_valid() {
            return Err(StoreError::InvalidData(format!(
                "system template {:?}: {}",
                template.name,
                check.summary()
            )));
        }
        if store.insert_system_template(&template).await? {
            tracing::info!(name = %template.name, category = %template.category, "seeded system template");
            report.inserted += 1;
        } else {
            report.skipped += 1;
        }
    }
    Ok(report)
}
