//! Built-in prompt templates.

/// Name of the built-in generator template.
pub const DEFAULT_GENERATOR_TEMPLATE: &str = "upsell-default";

/// Name of the judge template.
pub const JUDGE_TEMPLATE_NAME: &str = "upsell-judge";

/// System prompt for the generator.
pub const GENERATOR_SYSTEM: &str = "You write personalized, honest service upsell messages for a pest control company. \
You respond with a single JSON object and nothing else.";

/// System prompt for the judge.
pub const JUDGE_SYSTEM: &str = "You are a strict quality reviewer for customer-facing upsell messages. \
You respond with a single JSON object and nothing else.";

pub const GENERATOR_TEMPLATE: &str = r#"You are creating a personalized service upsell message for a pest control customer.

Customer Data (JSON):
{{customer_json}}

Service Catalog:
{{catalog}}

Brand Guidelines:
{{brand}}
{{#if features}}

CUSTOMER INSIGHTS (from Feature Store):
{{features}}
Use these insights to personalize the message and select the most relevant service.
{{/if}}

Your task:
1. Analyze the customer data provided (use whatever fields are present)
2. Look for patterns in service history, property details, and current plan
3. Select ONE service from the catalog that would genuinely benefit this customer
4. Write a personalized message ({{min_words}}-{{max_words}} words) that:
   - References POSITIVE details from their data (loyalty, property features, service frequency)
   - Explains why this additional service makes sense for them
   - Highlights 2-3 key benefits relevant to their situation
   - Ends with a soft call to action
   - Keeps the brand voice

Do NOT mention complaints, late arrivals, dissatisfaction, or any other negative detail from service notes.
{{#if current_plan}}
The customer's current plan is "{{current_plan}}". Do not recommend it.
{{/if}}
Address the customer as {{first_name}}.
{{#if feedback}}

IMPORTANT - Previous attempt {{feedback.attempt}} was rejected for {{feedback.category}}:
{{feedback.text}}
{{#each feedback.issues}}
- {{this}}
{{/each}}
{{feedback.guidance}}
{{/if}}

Respond with ONLY a JSON object of this shape:
{"subject": "<subject line>", "body": "<message body, no greeting line>", "confidence": <0.0-1.0>, "service": "<exact catalog service name>"}"#;

pub const JUDGE_TEMPLATE: &str = r#"Evaluate this upsell message. Today is {{today}}.

Customer Data (JSON):
{{customer_json}}
{{#if features}}

Customer Insights:
{{features}}
{{/if}}

Service Catalog:
{{catalog}}

Brand Guidelines:
{{brand}}

Message under review:
Subject: {{subject}}
Recommended service: {{service}}
Body:
{{body}}

Check each criterion independently:
1. appropriateness - Is this an acceptable moment to contact the customer? Fail on recent low satisfaction, an upsell sent within the last {{cooldown_days}} days, or unresolved complaints in service notes.
2. service_validity - Does the recommended service exist in the catalog, and is it something other than the customer's current plan?
3. brand - Does the tone match the brand guidelines, with no overclaiming, no avoided phrases, and no facts that contradict the customer data?

Score overall writing quality from 0 to 10 regardless of the pass/fail results.

Respond with ONLY a JSON object of this shape:
{"checks": {"appropriateness": {"passed": true, "feedback": "..."}, "service_validity": {"passed": true, "feedback": "..."}, "brand": {"passed": true, "feedback": "..."} }, "score": 8, "feedback": "<overall justification>", "issues": ["<specific issue>"]}"#;
