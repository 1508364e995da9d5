pub mod captions;
pub mod cloner;
pub mod identity;
pub mod inpainting;
pub mod normalize;
pub mod poser;
pub mod prompter;
pub mod recreation;
pub mod request;
