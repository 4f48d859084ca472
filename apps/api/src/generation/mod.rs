// Generation Pipeline — produces the tailored résumé for one job.
// Fixed stages (strategy → draft) feed the bounded critic/reviser refine
// loop, then the format and verify tail. All LLM calls go through the
// CallGate — no direct API calls here.

pub mod audio;
pub mod pipeline;
pub mod prompts;
pub mod refine;
