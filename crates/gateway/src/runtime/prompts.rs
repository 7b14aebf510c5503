//! Fixed prompt and reply text for the turn runtime.

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System prompts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const ACTOR_SYSTEM: &str = "\
You are a travel assistant. Use the provided tools to ground every \
factual claim; never invent prices, schedules, weather, or policies. \
When a tool returns a source, mention facts from it faithfully. If tools \
fail, say what you could not verify instead of guessing. Keep replies \
concise and practical.";

pub const PLANNER_SYSTEM: &str = "\
You are a planning module. Given the user's message and context, return \
ONLY a JSON object, no prose, with this shape: \
{\"route\": string, \"confidence\": number, \"missing\": [string], \
\"consent\": {\"kind\": string, \"query\": string} | null, \
\"calls\": [{\"tool\": string, \"args\": object}], \
\"blend\": string, \"verify\": string}. \
Routes: weather, packing, attractions, destinations, flights, policy, \
web_search, unknown. Do not execute tools. Do not add fields.";

pub const ROUTER_SYSTEM: &str = "\
You classify one travel-assistant message. Return ONLY JSON: \
{\"intent\": string, \"confidence\": number, \"slots\": {string: string}}. \
Intents: weather, packing, attractions, destinations, flights, policy, \
web_search, unknown. Slot keys: city, destinationCity, originCity, \
country, region, month, dates, departureDate, returnDate, \
travelerProfile, groupType, budgetLevel, activityType, search_query. \
Only include slots explicitly present in the message.";

pub const CONSENT_SYSTEM: &str = "\
The assistant asked the user for permission to run deep research. \
Classify the user's reply. Return ONLY JSON: \
{\"answer\": \"yes\" | \"no\" | \"unclear\"}.";

pub const CONTEXT_SWITCH_SYSTEM: &str = "\
Decide whether the new message talks about a DIFFERENT place or trip \
than the previous location. Return ONLY JSON: \
{\"verdict\": \"same\" | \"different\"}.";

pub const CITY_PARSE_SYSTEM: &str = "\
Extract the city the message explicitly names, if any. Return ONLY \
JSON: {\"city\": string | null}. Never guess a city that is not in the \
message.";

pub const INTENT_RETRY_SYSTEM: &str = "\
Second-opinion intent classification for a travel-assistant message. \
Return ONLY JSON: {\"intent\": string, \"confidence\": number}. Intents: \
weather, packing, attractions, destinations, flights, policy, \
web_search, unknown.";

pub const QUERY_OPTIMIZER_SYSTEM: &str = "\
Rewrite the user's message as one concise web-search query. Return ONLY \
JSON: {\"query\": string}.";

pub const FLIGHT_SLOTS_SYSTEM: &str = "\
Extract flight-search slots from the message. Return ONLY JSON with any \
of: {\"originCity\": string, \"destinationCity\": string, \
\"departureDate\": string, \"returnDate\": string}. Keep relative dates \
like \"tomorrow\" verbatim; do not convert them.";

pub const COMPLEXITY_SYSTEM: &str = "\
Judge whether this travel request needs multi-step research (many \
constraints: budget, group, dates, origin, destination, special needs). \
Return ONLY JSON: {\"isComplex\": boolean, \"confidence\": number, \
\"reasoning\": string}.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Canned replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const CONSENT_PROMPT_REPLY: &str = "\
That looks like a trip worth researching properly. Want me to run a \
deeper multi-source search? It takes a bit longer. (yes/no)";

pub const REDIRECT_REPLY: &str = "\
I can help with weather, packing, attractions, destinations, flights, \
and travel policies. What trip question can I look into for you?";

pub const GENERIC_FALLBACK_REPLY: &str = "\
I need a city or destination to help. Where are you thinking of going?";
